//! Machine-readable failure kinds.
//!
//! Every coordinator failure is returned with one of these kinds in the JSON
//! error body. The kind, not the human message, is the contract: the client
//! SDK and the UI dispatch on it ("not friends" vs "already in progress" vs
//! "session gone" must be distinguishable).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential missing, unknown, or does not match the resource owner.
    Unauthorized,
    /// Authorization predicate false (e.g. not friends). Terminal.
    Forbidden,
    /// Referenced entity absent, including "logically expired".
    NotFound,
    /// Malformed or self-referential input.
    InvalidArgument,
    /// Operation outside the state machine's allowed transitions; the
    /// caller's view is stale and should be refreshed.
    InvalidState,
    /// An outstanding connection request already exists for this pair.
    DuplicateRequest,
    /// The accounts are already friends.
    AlreadyFriends,
    /// A pending friend request already exists in either direction.
    RequestExists,
    /// The username is taken.
    UsernameTaken,
    /// The target session is not live right now; the user may retry later.
    TargetUnavailable,
    /// Coordinator-side fault; detail is logged, not returned.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidState => "invalid_state",
            Self::DuplicateRequest => "duplicate_request",
            Self::AlreadyFriends => "already_friends",
            Self::RequestExists => "request_exists",
            Self::UsernameTaken => "username_taken",
            Self::TargetUnavailable => "target_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_as_str() {
        for kind in [
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::NotFound,
            ErrorKind::InvalidArgument,
            ErrorKind::InvalidState,
            ErrorKind::DuplicateRequest,
            ErrorKind::AlreadyFriends,
            ErrorKind::RequestExists,
            ErrorKind::UsernameTaken,
            ErrorKind::TargetUnavailable,
            ErrorKind::Internal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: ErrorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
