use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use parley_shared::protocol::{
    IncomingPingInfo, IncomingPingListResponse, PingStatusResponse, SendPingRequest,
    SendPingResponse,
};

use crate::api::AppState;
use crate::error::ApiError;

/// Probe another session's responsiveness. Supersedes any previous probe
/// from the same pinger toward the same target.
pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendPingRequest>,
) -> Result<Json<SendPingResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    let ping = db.send_ping(&req.from_session, &req.to_session, account.id)?;

    Ok(Json(SendPingResponse { ping_id: ping.id }))
}

/// Answer a probe addressed to one of the caller's sessions. A late answer
/// against a probe that is already gone is a harmless no-op.
pub async fn respond(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.respond_ping(id, account.id)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Read a probe's status. Unauthenticated: the id itself is an unguessable
/// capability, and the read has no side effects.
pub async fn poll(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PingStatusResponse>, ApiError> {
    let db = state.db.lock().await;
    let status = db.poll_ping(id)?;

    Ok(Json(PingStatusResponse { status }))
}

/// Unanswered probes addressed to one of the caller's sessions.
pub async fn list_incoming(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IncomingPingListResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let pings = db.list_incoming_pings(&handle, account.id)?;

    Ok(Json(IncomingPingListResponse {
        pings: pings
            .into_iter()
            .map(|p| IncomingPingInfo {
                id: p.id,
                created_at: p.created_at,
            })
            .collect(),
    }))
}
