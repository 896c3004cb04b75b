//! Request/response DTOs of the coordinator REST surface.
//!
//! Every struct derives `Serialize` and `Deserialize` so the same types back
//! both the axum handlers and the client SDK.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kinds::ErrorKind;
use crate::types::{ConnectionStatus, FriendDecision, PingStatus};

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message, safe to surface in a UI.
    pub error: String,
    /// Machine-readable kind; the part clients dispatch on.
    pub kind: ErrorKind,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountResponse {
    pub account_id: Uuid,
    pub username: String,
    /// The bearer credential for all subsequent calls. Shown exactly once.
    pub credential: String,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSessionResponse {
    pub session: SessionInfo,
}

/// One live client attachment of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub handle: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

// ---------------------------------------------------------------------------
// Friends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFriendRequestRequest {
    pub to_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFriendRequestResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondFriendRequestRequest {
    pub decision: FriendDecision,
}

/// A pending friend request, as seen by its recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestInfo {
    pub id: Uuid,
    pub from_username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestListResponse {
    pub requests: Vec<FriendRequestInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendListResponse {
    pub friends: Vec<String>,
}

// ---------------------------------------------------------------------------
// Connection requests (signaling)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenConnectionRequest {
    pub from_session: String,
    pub to_session: String,
    /// Opaque handshake payload (e.g. an SDP offer). Relayed, never parsed.
    pub offer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenConnectionResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConnectionRequest {
    /// Opaque counter-payload (e.g. an SDP answer).
    pub answer: String,
}

/// The signaling handshake record, visible only to its two participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequestInfo {
    pub id: Uuid,
    pub from_session: String,
    pub to_session: String,
    pub from_display_name: String,
    pub status: ConnectionStatus,
    pub offer: String,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequestListResponse {
    pub requests: Vec<ConnectionRequestInfo>,
}

// ---------------------------------------------------------------------------
// Liveness pings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPingRequest {
    pub from_session: String,
    pub to_session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPingResponse {
    pub ping_id: Uuid,
}

/// `status` is `None` when the ping no longer exists (consumed, superseded
/// or swept) -- callers treat that the same as an unanswered probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingStatusResponse {
    pub status: Option<PingStatus>,
}

/// A probe addressed to one of the caller's sessions, awaiting a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingPingInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingPingListResponse {
    pub pings: Vec<IncomingPingInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_round_trip() {
        let body = ErrorBody {
            error: "not friends".into(),
            kind: ErrorKind::Forbidden,
        };
        let json = serde_json::to_string(&body).unwrap();
        let back: ErrorBody = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ErrorKind::Forbidden);
        assert_eq!(back.error, "not friends");
    }

    #[test]
    fn test_connection_request_info_optional_answer() {
        let json = r#"{
            "id": "6dbd51a0-3d1f-4b1a-9b3e-0b6ff0a4b6aa",
            "from_session": "a",
            "to_session": "b",
            "from_display_name": "alice",
            "status": "sent",
            "offer": "offer-payload",
            "answer": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"#;
        let info: ConnectionRequestInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.status, ConnectionStatus::Sent);
        assert!(info.answer.is_none());
    }
}
