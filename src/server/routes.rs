//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{health, images, license, products, tools};
use crate::middleware::{
    logging::log_request,
    rate_limit::{rate_limit, RateLimitState},
};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Health check routes (no rate limiting)
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/liveness", get(health::liveness));

    let rate_limit_state = RateLimitState::new(state.settings.rate_limit.clone());

    let api_routes = Router::new()
        .route("/tools/:tool", post(tools::run_tool))
        .route("/images", post(images::generate_image))
        .route("/products/analyze", post(products::analyze_product))
        .route("/license/verify", post(license::verify_license))
        .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit));

    Router::new()
        .nest("/v1", api_routes)
        .merge(health_routes)
        // Apply middleware layers (order matters: last added = outermost = runs first)
        .layer(create_cors_layer())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Create CORS layer with permissive settings
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("x-trace-id"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-quota-remaining"),
            HeaderName::from_static("retry-after"),
            HeaderName::from_static("content-disposition"),
        ])
}
