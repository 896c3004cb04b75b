use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use parley_shared::protocol::{
    FriendListResponse, FriendRequestInfo, FriendRequestListResponse, RespondFriendRequestRequest,
    SendFriendRequestRequest, SendFriendRequestResponse,
};
use parley_store::StoreError;

use crate::api::AppState;
use crate::error::ApiError;

/// Send a friend request by username.
pub async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendFriendRequestRequest>,
) -> Result<Json<SendFriendRequestResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    let request = db.send_friend_request(account.id, &req.to_username)?;

    Ok(Json(SendFriendRequestResponse {
        request_id: request.id,
    }))
}

/// Accept or reject a pending friend request addressed to the caller.
pub async fn respond(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<RespondFriendRequestRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let mut db = state.db.lock().await;
    db.respond_friend_request(id, account.id, req.decision)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Pending friend requests addressed to the caller.
pub async fn list_incoming(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FriendRequestListResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let pending = db.list_incoming_friend_requests(account.id)?;

    Ok(Json(FriendRequestListResponse {
        requests: pending
            .into_iter()
            .map(|r| FriendRequestInfo {
                id: r.id,
                from_username: r.from_username,
                created_at: r.created_at,
            })
            .collect(),
    }))
}

/// The caller's friends, as usernames.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FriendListResponse>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let friends = db.list_friends(account.id)?;

    Ok(Json(FriendListResponse {
        friends: friends.into_iter().map(|a| a.username).collect(),
    }))
}

/// Remove a friendship. Idempotent once the other account exists.
pub async fn unfriend(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.authenticate(&headers).await?;

    let db = state.db.lock().await;
    let other = db
        .account_by_username(&username)?
        .ok_or(StoreError::NotFound)?;
    let removed = db.unfriend(account.id, other.id)?;

    Ok(Json(serde_json::json!({ "removed": removed })))
}
