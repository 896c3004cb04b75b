//! Session heartbeat loop.
//!
//! The coordinator treats a session as live only while heartbeats keep
//! arriving; this task keeps one session alive. Any heartbeat failure
//! stops the loop and flips the liveness flag to false: the coordinator
//! never retries on the client's behalf, so whoever owns the task decides
//! whether to register a fresh session.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use parley_shared::constants::HEARTBEAT_PERIOD_SECS;

use crate::api::CoordinatorClient;

/// A running heartbeat loop for one session.
///
/// Aborted on drop; the session then goes stale on the coordinator within
/// the staleness window. Call [`CoordinatorClient::deactivate_session`]
/// for an immediate, explicit detach.
pub struct HeartbeatTask {
    task: tokio::task::JoinHandle<()>,
    live_rx: watch::Receiver<bool>,
}

impl HeartbeatTask {
    /// Start heartbeating `session_handle` at the standard period.
    pub fn spawn(client: CoordinatorClient, session_handle: String) -> Self {
        Self::spawn_with_period(
            client,
            session_handle,
            Duration::from_secs(HEARTBEAT_PERIOD_SECS),
        )
    }

    /// Start heartbeating at a custom period (tests use short ones).
    pub fn spawn_with_period(
        client: CoordinatorClient,
        session_handle: String,
        period: Duration,
    ) -> Self {
        let (live_tx, live_rx) = watch::channel(true);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match client.heartbeat(&session_handle).await {
                    Ok(()) => {
                        debug!(session = %session_handle, "heartbeat ok");
                    }
                    Err(e) => {
                        warn!(
                            session = %session_handle,
                            error = %e,
                            "heartbeat failed, session is no longer live"
                        );
                        let _ = live_tx.send(false);
                        break;
                    }
                }
            }
        });

        Self { task, live_rx }
    }

    /// Whether the loop still believes the session is live.
    pub fn is_live(&self) -> bool {
        *self.live_rx.borrow()
    }

    /// A watch receiver that flips to `false` when the loop stops.
    pub fn live_watch(&self) -> watch::Receiver<bool> {
        self.live_rx.clone()
    }

    /// Stop heartbeating without deactivating the session.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_heartbeat_flips_liveness() {
        // Nothing listens here, so the very first heartbeat fails.
        let client = CoordinatorClient::new("http://127.0.0.1:1").with_credential("x".repeat(32));
        let task = HeartbeatTask::spawn_with_period(
            client,
            "some-session".into(),
            Duration::from_millis(10),
        );

        let mut watch = task.live_watch();
        tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|live| !live))
            .await
            .expect("liveness flag should flip")
            .expect("watch should stay open");

        assert!(!task.is_live());
    }
}
