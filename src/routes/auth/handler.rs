use axum::http::{Method, Uri};

use crate::error::AppError;

/// Every auth endpoint answers 410 in this build. Requests still pass the
/// `auth` rate limit first.
pub async fn disabled(method: Method, uri: Uri) -> AppError {
    tracing::info!("Rejected {} {}: authentication disabled", method, uri);
    AppError::AuthDisabled
}
