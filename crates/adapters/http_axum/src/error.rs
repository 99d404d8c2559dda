//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use tillguard_domain::error::{ProviderError, TillguardError, ValidationError};
use tillguard_domain::outcome::{ErrorKind, error_chain};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
}

/// Maps [`TillguardError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(pub(crate) TillguardError);

impl From<TillguardError> for ApiError {
    fn from(err: TillguardError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(TillguardError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = ErrorKind::from(&self.0);
        let (status, message) = match &self.0 {
            TillguardError::Validation(err)
            | TillguardError::Provider(ProviderError::Validation(err)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            TillguardError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            TillguardError::InvalidTransition(err) => (StatusCode::CONFLICT, err.to_string()),
            TillguardError::SessionExpired => {
                (StatusCode::UNAUTHORIZED, "session expired".to_string())
            }
            TillguardError::Provider(err) => {
                tracing::warn!(error = %error_chain(err), "provider error");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            TillguardError::Vault(_) | TillguardError::Storage(_) => {
                tracing::error!(error = %error_chain(&self.0), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                kind,
            }),
        )
            .into_response()
    }
}
