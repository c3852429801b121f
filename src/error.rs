use axum::Json;
use axum::{
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Too many requests, retry in {retry_after_secs} seconds")]
    RateLimited { limit: u32, retry_after_secs: u64 },

    #[error("Unable to identify the client for rate limiting")]
    IdentityUnavailable,

    #[error("Rate limiting is temporarily unavailable")]
    RateLimitStoreUnavailable(#[source] CacheError),

    #[error("Authentication is disabled in this build.")]
    AuthDisabled,

    #[error("Failed to invalidate cached card data: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::IdentityUnavailable => StatusCode::BAD_REQUEST,
            AppError::RateLimitStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AuthDisabled => StatusCode::GONE,
            AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            error: self.to_string(),
        });

        match self {
            AppError::RateLimited {
                limit,
                retry_after_secs,
            } => (
                status,
                [
                    (header::RETRY_AFTER, retry_after_secs.to_string()),
                    (HeaderName::from_static("x-ratelimit-limit"), limit.to_string()),
                    (HeaderName::from_static("x-ratelimit-remaining"), "0".to_string()),
                ],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
