use axum::{extract::State, Json};
use tracing::info;

use parley_shared::protocol::{CreateAccountRequest, CreateAccountResponse};

use crate::api::AppState;
use crate::error::ApiError;

/// Create an account and hand back its bearer credential (shown exactly
/// once; credentials never rotate).
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, ApiError> {
    if !state.config.registration_open {
        return Err(ApiError::Forbidden(
            "registration is closed on this instance".into(),
        ));
    }

    let db = state.db.lock().await;
    let account = db.create_account(&req.username)?;

    info!(username = %account.username, "account registered via API");

    Ok(Json(CreateAccountResponse {
        account_id: account.id,
        username: account.username,
        credential: account.credential,
    }))
}
