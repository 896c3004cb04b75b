use serde::{Deserialize, Serialize};

/// Lifecycle of a connection (signaling) request.
///
/// Transitions are monotonic: `Sent -> Replied -> Completed`. A `Sent` or
/// `Replied` request can also disappear entirely via expiry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Sent,
    Replied,
    Completed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Replied => "replied",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "replied" => Some(Self::Replied),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Lifecycle of a liveness probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PingStatus {
    Sent,
    Responded,
}

impl PingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Responded => "responded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "responded" => Some(Self::Responded),
            _ => None,
        }
    }
}

/// Lifecycle of a friend request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The recipient's verdict on a friend request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FriendDecision {
    Accept,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            ConnectionStatus::Sent,
            ConnectionStatus::Replied,
            ConnectionStatus::Completed,
        ] {
            assert_eq!(ConnectionStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(ConnectionStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_serde_rename() {
        let json = serde_json::to_string(&ConnectionStatus::Replied).unwrap();
        assert_eq!(json, "\"replied\"");
    }
}
