use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use parley_shared::protocol::{
    ConnectionRequestInfo, ConnectionRequestListResponse, OpenConnectionRequest,
    OpenConnectionResponse, ReplyConnectionRequest,
};
use parley_store::models::ConnectionRequest;

use crate::api::AppState;
use crate::error::ApiError;

/// Open a connection request toward another session, relaying the opaque
/// handshake payload. Friend-gated; see the store for the precondition
/// order.
pub async fn open(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OpenConnectionRequest>,
) -> Result<Json<OpenConnectionResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    let request = db.open_connection_request(
        &req.from_session,
        &req.to_session,
        account.id,
        &req.offer,
        state.config.staleness(),
        state.config.expiry(),
    )?;

    Ok(Json(OpenConnectionResponse {
        request_id: request.id,
    }))
}

/// Store the counter-payload: `sent -> replied`.
pub async fn reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ReplyConnectionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.reply_connection_request(id, account.id, &req.answer, state.config.expiry())?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Mark the handshake complete once a transport reports the channel open.
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.complete_connection_request(id, account.id, state.config.expiry())?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Requests awaiting an answer from one of the caller's sessions.
pub async fn list_incoming(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConnectionRequestListResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let requests =
        db.list_incoming_connection_requests(&handle, account.id, state.config.expiry())?;

    Ok(Json(ConnectionRequestListResponse {
        requests: requests.into_iter().map(to_info).collect(),
    }))
}

/// Point-in-time view of a request, for its two participants only.
pub async fn check_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ConnectionRequestInfo>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let request = db.check_connection_request(id, account.id, state.config.expiry())?;

    Ok(Json(to_info(request)))
}

fn to_info(request: ConnectionRequest) -> ConnectionRequestInfo {
    ConnectionRequestInfo {
        id: request.id,
        from_session: request.from_session,
        to_session: request.to_session,
        from_display_name: request.from_display_name,
        status: request.status,
        offer: request.offer,
        answer: request.answer,
        created_at: request.created_at,
        updated_at: request.updated_at,
    }
}
