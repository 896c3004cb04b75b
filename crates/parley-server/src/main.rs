//! # parley-server
//!
//! Rendezvous coordinator for the Parley network.
//!
//! This binary lets two authenticated clients, each behind NAT, discover
//! each other's liveness and exchange the out-of-band handshake payloads
//! needed to open a direct transport connection:
//! - **Session registry** with heartbeat-based liveness tracking
//! - **Friend graph** gating who may signal whom
//! - **Connection request state machine** relaying offer/answer payloads
//! - **Liveness probes** actively verifying a peer session before signaling
//! - **REST API** (axum) with bearer-credential auth
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod handlers;
mod rate_limit;
mod sweep;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley coordinator v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        admin_enabled = config.admin_token.is_some(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Open the coordinator database (creates the file and runs migrations).
    let db = match config.db_path {
        Some(ref path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        config: Arc::new(config.clone()),
        rate_limiter: rate_limiter.clone(),
        started_at: Instant::now(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_idle(std::time::Duration::from_secs(600)).await;
        }
    });

    // Garbage collection for sessions, connection requests and pings.
    sweep::spawn_sweeps(&app_state);

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
