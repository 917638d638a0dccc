use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dog_vault::{unsatisfiable_content_range, VaultError};
use serde_json::json;
use tracing::warn;

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    Forbidden,
    BadRequest(String),
    Vault(VaultError),
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        Self::Vault(e)
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Forbidden => return error_body(StatusCode::FORBIDDEN, "Forbidden"),
            Self::BadRequest(message) => return error_body(StatusCode::BAD_REQUEST, message),
            Self::Vault(err) => err,
        };

        match &err {
            VaultError::RangeNotSatisfiable { size } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, unsatisfiable_content_range(*size))],
            )
                .into_response(),
            VaultError::NotFound { .. } => error_body(StatusCode::NOT_FOUND, "File not found"),
            VaultError::InvalidKey { .. } | VaultError::Invalid { .. } => {
                error_body(StatusCode::BAD_REQUEST, err.to_string())
            }
            VaultError::TooLarge { .. } => error_body(StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
            _ => {
                warn!("Request failed: {}", err);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
