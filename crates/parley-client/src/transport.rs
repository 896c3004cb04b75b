//! The local transport endpoint boundary.
//!
//! The coordinator relays opaque handshake payloads; producing and
//! consuming them is the job of whatever owns the actual direct connection
//! (a WebRTC peer connection, a QUIC endpoint, ...). That capability is
//! consumed through this trait and never reimplemented here.
//!
//! One adapter instance represents one attempted connection to one peer:
//! create it for a dial or accept, and drop or `close` it afterwards.
//! Holding the adapter inside a session-scoped [`PeerConnector`] (rather
//! than module-level state) is what makes several simultaneous peer
//! connections representable.
//!
//! [`PeerConnector`]: crate::connector::PeerConnector

use thiserror::Error;

/// Failures of the local transport endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local endpoint could not be created or produced no payload.
    #[error("Local endpoint error: {0}")]
    Endpoint(String),

    /// The remote payload could not be applied.
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// The channel closed before or while it was being established.
    #[error("Transport channel closed")]
    Closed,
}

/// One local transport endpoint for one peer connection.
#[allow(async_fn_in_trait)]
pub trait TransportAdapter: Send {
    /// Produce the local handshake payload (the offer) for a dial.
    async fn create_offer(&mut self) -> Result<String, TransportError>;

    /// Apply a remote offer and produce the counter-payload (the answer).
    async fn accept_offer(&mut self, offer: &str) -> Result<String, TransportError>;

    /// Apply the remote counter-payload on the dialing side.
    async fn accept_answer(&mut self, answer: &str) -> Result<(), TransportError>;

    /// Whether the direct channel is open right now.
    fn is_connected(&self) -> bool;

    /// Tear the endpoint down. Dropping the adapter must be equivalent.
    async fn close(&mut self);
}
