use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `X-API-Key` does not match the configured secret
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    if state.auth.required {
        let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(state.auth.api_key.as_str()) {
            return Err(ApiError::Forbidden);
        }
    }
    Ok(next.run(req).await)
}
