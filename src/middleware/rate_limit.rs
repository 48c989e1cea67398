//! Rate limiting middleware
//!
//! Token bucket per client id. Limiters are cached in memory and evicted
//! after ten idle minutes.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use moka::future::Cache;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::middleware::client::ClientId;

// ============================================================================
// Types
// ============================================================================

type ClientRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limit state shared across requests
#[derive(Clone)]
pub struct RateLimitState {
    pub config: Arc<RateLimitConfig>,

    /// Key: client id, Value: rate limiter
    pub limiters: Cache<String, Arc<ClientRateLimiter>>,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        let limiters = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(Duration::from_secs(600))
            .build();

        Self {
            config: Arc::new(config),
            limiters,
        }
    }

    /// Get or create the limiter for a client
    pub async fn get_limiter(&self, client: &ClientId) -> Arc<ClientRateLimiter> {
        let config = Arc::clone(&self.config);
        self.limiters
            .get_with(client.as_str().to_string(), async move {
                Arc::new(create_limiter(&config))
            })
            .await
    }
}

/// Burst of `requests_per_window`, refilled evenly over the window
fn create_limiter(config: &RateLimitConfig) -> ClientRateLimiter {
    let fallback = Quota::per_minute(NonZeroU32::new(30).unwrap_or(NonZeroU32::MIN));

    let quota = NonZeroU32::new(config.requests_per_window)
        .filter(|_| config.window_seconds > 0)
        .and_then(|burst| {
            let period = Duration::from_secs(config.window_seconds) / burst.get();
            Quota::with_period(period).map(|q| q.allow_burst(burst))
        })
        .unwrap_or(fallback);

    RateLimiter::direct(quota)
}

// ============================================================================
// Rate Limit Middleware
// ============================================================================

/// Middleware to enforce per-client rate limits
///
/// # Headers
/// - `X-RateLimit-Limit` on every allowed response
/// - `Retry-After` when the limit is exceeded
pub async fn rate_limit(
    State(rate_state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !rate_state.config.enabled {
        return Ok(next.run(request).await);
    }

    let client = ClientId::from_parts(request.headers(), request.extensions());
    let limiter = rate_state.get_limiter(&client).await;

    match limiter.check() {
        Ok(_) => {
            let mut response = next.run(request).await;
            if let Ok(v) = HeaderValue::from_str(&rate_state.config.requests_per_window.to_string()) {
                response.headers_mut().insert("x-ratelimit-limit", v);
            }
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after_seconds = retry_after.as_secs().max(1);

            tracing::warn!(
                client_id = %client,
                retry_after_seconds = retry_after_seconds,
                "Rate limit exceeded"
            );

            Err(ApiError::RateLimited {
                retry_after_seconds,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn config(requests_per_window: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_window,
            window_seconds: 60,
        }
    }

    #[test]
    fn test_burst_allowance() {
        let limiter = create_limiter(&config(10));

        for i in 0..10 {
            assert!(limiter.check().is_ok(), "Request {} should be allowed", i);
        }
        assert!(limiter.check().is_err(), "Request 11 should be rate limited");
    }

    #[tokio::test]
    async fn test_get_limiter_caching() {
        let state = RateLimitState::new(config(5));
        let client = ClientId("device-1".to_string());

        let limiter1 = state.get_limiter(&client).await;
        let limiter2 = state.get_limiter(&client).await;
        assert!(Arc::ptr_eq(&limiter1, &limiter2));

        let other = state.get_limiter(&ClientId("device-2".to_string())).await;
        assert!(!Arc::ptr_eq(&limiter1, &other));
    }

    #[tokio::test]
    async fn test_middleware_rejects_over_limit() {
        let state = RateLimitState::new(config(1));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit));

        let request = || {
            Request::builder()
                .uri("/")
                .header("x-client-id", "device-1")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "1");

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
    }
}
