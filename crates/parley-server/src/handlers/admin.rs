use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct AdminStatusResponse {
    name: String,
    registration_open: bool,
    uptime_secs: u64,
    accounts: u64,
    sessions: u64,
    connection_requests: u64,
    liveness_pings: u64,
}

/// Instance status and row counts, for operators.
pub async fn status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatusResponse>, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let db = state.db.lock().await;

    Ok(Json(AdminStatusResponse {
        name: state.config.instance_name.clone(),
        registration_open: state.config.registration_open,
        uptime_secs: state.started_at.elapsed().as_secs(),
        accounts: db.count_accounts()?,
        sessions: db.count_sessions()?,
        connection_requests: db.count_connection_requests()?,
        liveness_pings: db.count_pings()?,
    }))
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_token(token: Option<&str>) -> ServerConfig {
        ServerConfig {
            admin_token: token.map(String::from),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_disabled_without_token() {
        let headers = HeaderMap::new();
        let config = config_with_token(None);
        assert!(verify_admin_token(&headers, &config).is_err());
    }

    #[test]
    fn test_exact_token_required() {
        let config = config_with_token(Some("sekrit"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sekrit"));
        assert!(verify_admin_token(&headers, &config).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer wrong!"));
        assert!(verify_admin_token(&headers, &config).is_err());
    }
}
