//! Peer connector: drives one handshake end to end.
//!
//! A connector is a session-scoped context object: it owns the coordinator
//! client, the local session handle, and one transport adapter, and is
//! created per peer connection attempt. Nothing here is global, so a
//! client can run several connectors (several simultaneous peers) side by
//! side.
//!
//! The coordinator intentionally does not deduplicate simultaneous
//! bidirectional opens; [`wins_glare`] is the deterministic client-side
//! tie-break, and [`PeerConnector::dial`] yields to the peer's request
//! when it loses.

use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use parley_shared::constants::PING_TIMEOUT_SECS;
use parley_shared::protocol::ConnectionRequestInfo;
use parley_shared::types::{ConnectionStatus, PingStatus};

use crate::api::CoordinatorClient;
use crate::error::ClientError;
use crate::transport::TransportAdapter;

/// How often the dial loop re-reads the request status.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the probe loop re-reads the ping status.
const PING_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long to keep polling for a reply before giving up. Matches the
/// coordinator's expiry window: past it the request is gone anyway.
const REPLY_WAIT: Duration = Duration::from_secs(300);

/// How long to wait for the transport to report the channel open after
/// both payloads are applied.
const CONNECT_WAIT: Duration = Duration::from_secs(30);

/// Deterministic tie-break for simultaneous bidirectional dials: the
/// lexicographically lower session handle stays the initiator.
///
/// Antisymmetric by construction: exactly one side of any distinct pair
/// wins.
pub fn wins_glare(local_session: &str, remote_session: &str) -> bool {
    local_session < remote_session
}

/// How a dial attempt ended.
#[derive(Debug)]
pub enum DialOutcome {
    /// The direct channel is open.
    Connected { request_id: Uuid },
    /// The peer dialed us at the same time and wins the tie-break; our
    /// request was abandoned. The caller should [`PeerConnector::accept`]
    /// the returned request with a fresh adapter.
    GlareYield(ConnectionRequestInfo),
}

/// Drives one handshake between the local session and one peer session.
pub struct PeerConnector<T: TransportAdapter> {
    client: CoordinatorClient,
    session: String,
    adapter: T,
}

impl<T: TransportAdapter> PeerConnector<T> {
    pub fn new(client: CoordinatorClient, session_handle: String, adapter: T) -> Self {
        Self {
            client,
            session: session_handle,
            adapter,
        }
    }

    /// The local session handle this connector acts as.
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn adapter_mut(&mut self) -> &mut T {
        &mut self.adapter
    }

    /// Tear down and recover the adapter.
    pub fn into_adapter(self) -> T {
        self.adapter
    }

    // ------------------------------------------------------------------
    // Probing
    // ------------------------------------------------------------------

    /// Actively verify that `target_session` is responsive right now.
    ///
    /// Presence data may be minutes stale and a fresh heartbeat only
    /// proves the peer's clock is ticking, not that it can answer a
    /// handshake; this is a real round trip through the peer.
    pub async fn probe(&self, target_session: &str) -> Result<bool, ClientError> {
        let ping_id = self.client.send_ping(&self.session, target_session).await?;
        let deadline = Instant::now() + Duration::from_secs(PING_TIMEOUT_SECS);

        loop {
            if let Some(PingStatus::Responded) = self.client.poll_ping(ping_id).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!(target = %target_session, "liveness probe timed out");
                return Ok(false);
            }
            tokio::time::sleep(PING_POLL_INTERVAL).await;
        }
    }

    /// Answer every probe currently addressed to the local session.
    ///
    /// Clients call this from their poll loop; a late answer to a probe
    /// that is already gone is harmless.
    pub async fn answer_probes(&self) -> Result<usize, ClientError> {
        let pings = self.client.incoming_pings(&self.session).await?;
        let count = pings.len();
        for ping in pings {
            self.client.respond_ping(ping.id).await?;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Dialing
    // ------------------------------------------------------------------

    /// Initiate a handshake toward `target_session` and drive it until the
    /// direct channel is open.
    ///
    /// Probes first, then opens a connection request with a fresh offer and
    /// polls for the reply. If the peer turns out to be dialing us at the
    /// same time and wins the tie-break, our attempt stops and the peer's
    /// request is handed back for [`accept`](Self::accept).
    pub async fn dial(&mut self, target_session: &str) -> Result<DialOutcome, ClientError> {
        if !self.probe(target_session).await? {
            return Err(ClientError::PeerUnresponsive);
        }

        let offer = self.adapter.create_offer().await?;
        let request_id = self
            .client
            .open_connection(&self.session, target_session, &offer)
            .await?;
        info!(request = %request_id, target = %target_session, "dialing");

        let yield_on_glare = !wins_glare(&self.session, target_session);
        let deadline = Instant::now() + REPLY_WAIT;

        loop {
            // Glare: only the losing side watches for a counter-dial.
            if yield_on_glare {
                let incoming = self.client.incoming_connections(&self.session).await?;
                if let Some(peer_request) = incoming
                    .into_iter()
                    .find(|r| r.from_session == target_session)
                {
                    info!(
                        request = %peer_request.id,
                        "simultaneous dial detected, yielding to peer"
                    );
                    self.adapter.close().await;
                    return Ok(DialOutcome::GlareYield(peer_request));
                }
            }

            let status = self.client.connection_status(request_id).await?;
            if status.status == ConnectionStatus::Replied {
                let answer = status.answer.ok_or_else(|| {
                    ClientError::Protocol("replied request carries no answer".into())
                })?;
                self.adapter.accept_answer(&answer).await?;
                self.wait_connected().await?;
                self.client.complete_connection(request_id).await?;
                info!(request = %request_id, "direct channel open");
                return Ok(DialOutcome::Connected { request_id });
            }

            if Instant::now() >= deadline {
                // Expiry reclaims the request server-side; a retry must
                // start over with a fresh offer.
                return Err(ClientError::Timeout("connection reply"));
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    // ------------------------------------------------------------------
    // Accepting
    // ------------------------------------------------------------------

    /// Answer an incoming request (discovered via
    /// [`CoordinatorClient::incoming_connections`]) and drive the
    /// handshake until the direct channel is open.
    pub async fn accept(&mut self, incoming: &ConnectionRequestInfo) -> Result<(), ClientError> {
        let answer = self.adapter.accept_offer(&incoming.offer).await?;
        self.client.reply_connection(incoming.id, &answer).await?;
        info!(request = %incoming.id, from = %incoming.from_display_name, "accepted dial");

        self.wait_connected().await?;
        self.client.complete_connection(incoming.id).await?;
        info!(request = %incoming.id, "direct channel open");
        Ok(())
    }

    async fn wait_connected(&mut self) -> Result<(), ClientError> {
        let deadline = Instant::now() + CONNECT_WAIT;
        while !self.adapter.is_connected() {
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout("transport channel"));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }
}
