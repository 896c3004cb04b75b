use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::Method,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_store::Database;

use crate::config::ServerConfig;
use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<ServerConfig>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Identity store
        .route("/accounts", post(handlers::accounts::create))
        // Session registry
        .route(
            "/sessions",
            post(handlers::sessions::register).get(handlers::sessions::list_live),
        )
        .route("/sessions/:handle/heartbeat", post(handlers::sessions::heartbeat))
        .route("/sessions/:handle", delete(handlers::sessions::deactivate))
        .route("/presence/:username", get(handlers::sessions::presence))
        // Friend graph
        .route("/friends", get(handlers::friends::list))
        .route("/friends/:username", delete(handlers::friends::unfriend))
        .route(
            "/friends/requests",
            post(handlers::friends::send_request).get(handlers::friends::list_incoming),
        )
        .route(
            "/friends/requests/:id/respond",
            post(handlers::friends::respond),
        )
        // Connection request coordinator
        .route("/connections", post(handlers::connections::open))
        .route(
            "/connections/incoming/:handle",
            get(handlers::connections::list_incoming),
        )
        .route("/connections/:id", get(handlers::connections::check_status))
        .route("/connections/:id/reply", post(handlers::connections::reply))
        .route(
            "/connections/:id/complete",
            post(handlers::connections::complete),
        )
        // Liveness prober
        .route("/pings", post(handlers::pings::send))
        .route("/pings/incoming/:handle", get(handlers::pings::list_incoming))
        .route("/pings/:id", get(handlers::pings::poll))
        .route("/pings/:id/respond", post(handlers::pings::respond))
        // Operational surface
        .route("/admin/status", get(handlers::admin::status))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
