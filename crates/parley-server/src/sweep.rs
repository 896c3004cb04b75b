//! Periodic garbage collection.
//!
//! Staleness and logical expiry already hide dead records from every read
//! path; these tasks only bound storage. Each sweep runs on its own cadence
//! because the record lifetimes differ by orders of magnitude (hours for
//! sessions, minutes for connection requests, seconds for pings).

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::warn;

use parley_shared::constants::{
    COMPLETED_RETENTION_SECS, PING_MAX_AGE_SECS, PING_SWEEP_INTERVAL_SECS,
    REQUEST_SWEEP_INTERVAL_SECS, SESSION_MAX_AGE_SECS, SESSION_SWEEP_INTERVAL_SECS,
};

use crate::api::AppState;

/// Spawn the three background sweep tasks.
pub fn spawn_sweeps(state: &AppState) {
    let sessions = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let mut db = sessions.db.lock().await;
            if let Err(e) = db.sweep_sessions(ChronoDuration::seconds(SESSION_MAX_AGE_SECS)) {
                warn!(error = %e, "session sweep failed");
            }
        }
    });

    let requests = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(REQUEST_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let mut db = requests.db.lock().await;
            if let Err(e) = db.sweep_connection_requests(
                requests.config.expiry(),
                ChronoDuration::seconds(COMPLETED_RETENTION_SECS),
            ) {
                warn!(error = %e, "connection request sweep failed");
            }
        }
    });

    let pings = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PING_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let mut db = pings.db.lock().await;
            if let Err(e) = db.sweep_pings(ChronoDuration::seconds(PING_MAX_AGE_SECS)) {
                warn!(error = %e, "ping sweep failed");
            }
        }
    });
}
