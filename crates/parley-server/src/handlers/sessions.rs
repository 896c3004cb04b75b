use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use parley_shared::protocol::{RegisterSessionResponse, SessionInfo, SessionListResponse};
use parley_store::models::Session;
use parley_store::StoreError;

use crate::api::AppState;
use crate::error::ApiError;

/// Attach a new session to the calling account.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RegisterSessionResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let session = db.register_session(account.id)?;

    Ok(Json(RegisterSessionResponse {
        session: to_info(session, account.username),
    }))
}

/// Refresh a session's heartbeat.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.heartbeat(&handle, account.id)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Detach a session. Idempotent.
pub async fn deactivate(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.deactivate_session(&handle, account.id)?;

    Ok(Json(serde_json::json!({ "deactivated": true })))
}

/// The calling account's own live sessions.
pub async fn list_live(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionListResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let sessions = db.list_live_sessions(account.id, state.config.staleness())?;

    Ok(Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(|s| to_info(s, account.username.clone()))
            .collect(),
    }))
}

/// Another account's live sessions, for presence discovery.
///
/// Requires only a valid credential: presence browsing and signaling are
/// different privilege levels, and only signaling is friend-gated.
pub async fn presence(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SessionListResponse>, ApiError> {
    state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let other = db
        .account_by_username(&username)?
        .ok_or(StoreError::NotFound)?;
    let sessions = db.list_live_sessions(other.id, state.config.staleness())?;

    Ok(Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(|s| to_info(s, other.username.clone()))
            .collect(),
    }))
}

fn to_info(session: Session, username: String) -> SessionInfo {
    SessionInfo {
        handle: session.handle,
        username,
        created_at: session.created_at,
        last_heartbeat: session.last_heartbeat,
    }
}
