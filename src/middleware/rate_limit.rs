use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};

use crate::{
    cache::{RateLimitStore, keys::rate_limit_key},
    config::{Config, ConfigError, FailurePolicy, RateLimitConfig},
    error::AppError,
    middleware::identity::{Identity, IdentityResolver},
};

/// Fixed-window limiter guarding one scope of the API.
#[derive(Clone)]
pub struct RateLimiter {
    scope: String,
    limit: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    identity: IdentityResolver,
    policy: FailurePolicy,
}

impl RateLimiter {
    /// Peer-address identity and a closed failure policy, the same as
    /// [`RateLimiter::from_config`] with a default [`Config`].
    pub fn new(
        scope: impl Into<String>,
        limit: RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self {
            scope: scope.into(),
            limit,
            store,
            identity: IdentityResolver::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn from_config(
        scope: impl Into<String>,
        config: &Config,
        store: Arc<dyn RateLimitStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(scope, config.rate_limit()?, store)
            .with_identity(IdentityResolver::from_config(config))
            .with_failure_policy(config.rate_limit_failure_policy))
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn limit(&self) -> RateLimitConfig {
        self.limit
    }

    pub fn resolve_identity<B>(&self, req: &Request<B>) -> Option<Identity> {
        self.identity.resolve(req)
    }

    /// Counts one request from `identity` at `now` (Unix ms) and decides
    /// whether it may proceed.
    pub async fn admit(&self, identity: Option<&Identity>, now: i64) -> Result<(), AppError> {
        let Some(identity) = identity else {
            return match self.policy {
                FailurePolicy::Open => {
                    tracing::warn!("[{}] no client identity, admitting uncounted", self.scope);
                    Ok(())
                }
                FailurePolicy::Closed => {
                    tracing::warn!("[{}] no client identity, rejecting", self.scope);
                    Err(AppError::IdentityUnavailable)
                }
            };
        };

        let key = rate_limit_key(&self.scope, &identity.key());

        match self.store.increment(&key, &self.limit, now).await {
            Ok(outcome) if outcome.admitted => {
                tracing::debug!(
                    "[{}] admitted {}, {} remaining",
                    self.scope,
                    identity.key(),
                    outcome.remaining
                );
                Ok(())
            }
            Ok(outcome) => {
                let retry_after_secs = outcome.retry_after_secs(now);
                tracing::warn!(
                    "[{}] rate limit exceeded for {}, retry in {}s",
                    self.scope,
                    identity.key(),
                    retry_after_secs
                );
                Err(AppError::RateLimited {
                    limit: outcome.limit,
                    retry_after_secs,
                })
            }
            Err(e) => match self.policy {
                FailurePolicy::Open => {
                    tracing::warn!("[{}] rate limit store failed, admitting: {}", self.scope, e);
                    Ok(())
                }
                FailurePolicy::Closed => {
                    tracing::error!("[{}] rate limit store failed, rejecting: {}", self.scope, e);
                    Err(AppError::RateLimitStoreUnavailable(e))
                }
            },
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    // Resolve before awaiting: the request body is not Sync.
    let identity = limiter.resolve_identity(&req);
    let now = chrono::Utc::now().timestamp_millis();

    match limiter.admit(identity.as_ref(), now).await {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Wraps every route of `router` with `limiter`. Requests to unmatched paths
/// are not counted.
pub fn with_rate_limit<S>(router: Router<S>, limiter: RateLimiter) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(from_fn_with_state(Arc::new(limiter), rate_limit))
}
