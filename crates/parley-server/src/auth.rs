//! Bearer-credential authentication.
//!
//! Every mutating call (and most reads) carries an opaque bearer credential
//! proving account identity; the coordinator never trusts a client-asserted
//! account id without it.

use axum::http::HeaderMap;

use parley_shared::token;
use parley_store::models::Account;

use crate::api::AppState;
use crate::error::ApiError;

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingCredential)?;

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
    if !token::is_well_formed(token) {
        return Err(ApiError::MissingCredential);
    }
    Ok(token)
}

impl AppState {
    /// Resolve the caller's credential to its account.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Account, ApiError> {
        let credential = bearer_token(headers)?;
        let db = self.db.lock().await;
        db.account_by_credential(credential)?
            .ok_or(ApiError::BadCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let token = token::generate();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(bearer_token(&headers).unwrap(), token);

        // The bare token (no scheme prefix) is accepted too.
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(&token).unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), token);
    }

    #[test]
    fn test_missing_or_malformed_credential() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(ApiError::MissingCredential)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer nope"));
        assert!(matches!(
            bearer_token(&headers),
            Err(ApiError::MissingCredential)
        ));
    }
}
