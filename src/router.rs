use axum::{
    Router,
    middleware::from_fn,
    routing::{any, get, post},
};

use crate::{
    AppState,
    config::ConfigError,
    middleware::{RateLimiter, log_errors, with_rate_limit},
    routes,
};

// Authentication endpoints, each gated by the `auth` limiter
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", any(routes::auth::disabled))
        .route("/auth/{*path}", any(routes::auth::disabled))
}

fn openapi_routes() -> Router<AppState> {
    Router::new().route("/openapi.json", get(routes::openapi::document))
}

fn card_routes() -> Router<AppState> {
    Router::new().route(
        "/cards/{card_public_id}/invalidate",
        post(routes::card::invalidate),
    )
}

/// Builds the full application. Every gated group gets its own limiter
/// scope, so exhausting one group does not affect the others.
pub fn create_router(state: AppState) -> Result<Router, ConfigError> {
    let limiter = |scope: &str| {
        RateLimiter::from_config(scope, &state.config, state.rate_limit_store.clone())
    };

    let api = Router::new()
        .merge(with_rate_limit(auth_routes(), limiter("auth")?))
        .merge(with_rate_limit(openapi_routes(), limiter("openapi")?))
        .merge(with_rate_limit(card_routes(), limiter("cards")?))
        .route("/health", get(routes::health));

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    Ok(router.layer(from_fn(log_errors)).with_state(state))
}
