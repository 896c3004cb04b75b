use thiserror::Error;

use parley_shared::kinds::ErrorKind;

use crate::transport::TransportError;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the coordinator at all.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The coordinator rejected the call. The kind is the coordinator's
    /// contract; callers dispatch on it, not on the message.
    #[error("Coordinator rejected the call ({kind}): {message}")]
    Api { kind: ErrorKind, message: String },

    /// The coordinator answered with something the protocol does not allow
    /// (e.g. a replied request without a counter-payload).
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The local transport endpoint failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A client-driven wait point elapsed.
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// The liveness probe went unanswered: the peer session may be
    /// registered but cannot participate in a handshake right now.
    #[error("Peer session is not responsive")]
    PeerUnresponsive,
}

impl ClientError {
    /// The coordinator's failure kind, when this error carries one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
