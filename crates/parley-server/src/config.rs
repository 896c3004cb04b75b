//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the coordinator can start with
//! zero configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;

use parley_shared::constants::{
    CONNECTION_REQUEST_EXPIRY_SECS, DEFAULT_HTTP_PORT, SESSION_STALENESS_SECS,
};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database. When unset, the
    /// platform-appropriate data directory is used.
    /// Env: `DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Human-readable name for this coordinator instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Parley Coordinator"`
    pub instance_name: String,

    /// Whether new accounts can be created via the API.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Heartbeat age in seconds after which a session is dead to every
    /// read path.
    /// Env: `SESSION_STALENESS_SECS`
    /// Default: 60 (2x the client heartbeat period).
    pub session_staleness_secs: i64,

    /// Age in seconds after which a non-completed connection request is
    /// reclaimed.
    /// Env: `CONNECTION_EXPIRY_SECS`
    /// Default: 300.
    pub connection_expiry_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: None,
            instance_name: "Parley Coordinator".to_string(),
            registration_open: true,
            admin_token: None,
            session_staleness_secs: SESSION_STALENESS_SECS,
            connection_expiry_secs: CONNECTION_REQUEST_EXPIRY_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Ok(val) = std::env::var("SESSION_STALENESS_SECS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.session_staleness_secs = n,
                _ => tracing::warn!(value = %val, "Invalid SESSION_STALENESS_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("CONNECTION_EXPIRY_SECS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.connection_expiry_secs = n,
                _ => tracing::warn!(value = %val, "Invalid CONNECTION_EXPIRY_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Session staleness window as a duration.
    pub fn staleness(&self) -> Duration {
        Duration::seconds(self.session_staleness_secs)
    }

    /// Connection request expiry window as a duration.
    pub fn expiry(&self) -> Duration {
        Duration::seconds(self.connection_expiry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.registration_open);
        assert!(config.admin_token.is_none());
        assert_eq!(config.staleness(), Duration::seconds(60));
        assert_eq!(config.expiry(), Duration::seconds(300));
    }
}
