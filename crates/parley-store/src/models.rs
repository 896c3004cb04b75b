//! Domain model structs persisted in the coordinator database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be mapped
//! onto the API DTOs without intermediate types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_shared::types::{ConnectionStatus, FriendRequestStatus, PingStatus};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// An identity: unique display name plus a durable opaque bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique account identifier.
    pub id: Uuid,
    /// Immutable display name.
    pub username: String,
    /// Opaque bearer token proving account identity on every call.
    pub credential: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live client attachment for an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Unguessable session handle, unique process-wide.
    pub handle: String,
    /// The owning account.
    pub account_id: Uuid,
    /// When the session was registered.
    pub created_at: DateTime<Utc>,
    /// Refreshed by the owning client's heartbeat loop.
    pub last_heartbeat: DateTime<Utc>,
    /// Cleared on explicit deactivation.
    pub active: bool,
}

impl Session {
    /// A session is live iff it is active and has heartbeated within the
    /// staleness window. Every read path applies this, whether or not the
    /// row has been physically deleted yet.
    pub fn is_live(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        self.active && now - self.last_heartbeat < staleness
    }
}

// ---------------------------------------------------------------------------
// Friend request
// ---------------------------------------------------------------------------

/// A directed friend request. Mutated (status) only by its recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A pending friend request joined with the sender's username, as listed
/// for the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingFriendRequest {
    pub id: Uuid,
    pub from_account: Uuid,
    pub from_username: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Connection request
// ---------------------------------------------------------------------------

/// The signaling handshake record relayed between two sessions.
///
/// `from_account` / `to_account` are denormalized from the session rows at
/// creation time so participant authorization keeps working after the
/// session sweep deletes either row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub id: Uuid,
    pub from_session: String,
    pub to_session: String,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub from_display_name: String,
    /// Opaque handshake payload (offer). Relayed, never interpreted.
    pub offer: String,
    /// Opaque counter-payload (answer), present once replied.
    pub answer: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRequest {
    /// A non-completed request past the expiry window is treated as absent
    /// by every read path, even before the sweep physically deletes it.
    pub fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        self.status != ConnectionStatus::Completed && now - self.updated_at > expiry
    }
}

// ---------------------------------------------------------------------------
// Liveness ping
// ---------------------------------------------------------------------------

/// An ephemeral request/response probe verifying that a specific session is
/// responsive right now, independent of heartbeat recency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LivenessPing {
    pub id: Uuid,
    pub pinger_session: String,
    pub target_session: String,
    /// Denormalized owner of `target_session`, for respond authorization.
    pub target_account: Uuid,
    pub status: PingStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_liveness_window() {
        let now = Utc::now();
        let session = Session {
            handle: "h".into(),
            account_id: Uuid::new_v4(),
            created_at: now,
            last_heartbeat: now - Duration::seconds(59),
            active: true,
        };
        assert!(session.is_live(now, Duration::seconds(60)));

        let stale = Session {
            last_heartbeat: now - Duration::seconds(61),
            ..session.clone()
        };
        assert!(!stale.is_live(now, Duration::seconds(60)));

        let inactive = Session {
            active: false,
            ..session
        };
        assert!(!inactive.is_live(now, Duration::seconds(60)));
    }

    #[test]
    fn test_completed_requests_never_expire() {
        let now = Utc::now();
        let req = ConnectionRequest {
            id: Uuid::new_v4(),
            from_session: "a".into(),
            to_session: "b".into(),
            from_account: Uuid::new_v4(),
            to_account: Uuid::new_v4(),
            from_display_name: "alice".into(),
            offer: "offer".into(),
            answer: Some("answer".into()),
            status: ConnectionStatus::Completed,
            created_at: now - Duration::hours(2),
            updated_at: now - Duration::hours(2),
        };
        assert!(!req.is_expired(now, Duration::minutes(5)));

        let sent = ConnectionRequest {
            status: ConnectionStatus::Sent,
            ..req
        };
        assert!(sent.is_expired(now, Duration::minutes(5)));
    }
}
