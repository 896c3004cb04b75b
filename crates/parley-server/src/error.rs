use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_shared::kinds::ErrorKind;
use parley_shared::protocol::ErrorBody;
use parley_store::StoreError;

/// API-level failures.
///
/// Most variants simply carry a [`StoreError`] through; the response body
/// always exposes the machine-readable kind, because the kind is the
/// contract ("not friends" vs "already in progress" vs "session gone").
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Missing or malformed bearer credential")]
    MissingCredential,

    #[error("Unknown credential")]
    BadCredential,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::MissingCredential | Self::BadCredential => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let status = match kind {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidState
            | ErrorKind::DuplicateRequest
            | ErrorKind::AlreadyFriends
            | ErrorKind::RequestExists
            | ErrorKind::UsernameTaken
            | ErrorKind::TargetUnavailable => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail goes to the log, not to the caller.
        let message = if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: message,
            kind,
        };

        (status, axum::Json(body)).into_response()
    }
}
