//! HTTP routes.
//!
//! Health checks are served at `/` and `/health`; conversions at
//! `/remove-background`. Processed images are never cacheable.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod remove_background;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_NO_STORE;
use crate::cors::build_cors_layer;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes, the CORS policy and request tracing.
pub fn create_router(state: AppState) -> Router {
    let conversion_routes = Router::new()
        .route("/remove-background", post(remove_background::upload))
        .layer(DefaultBodyLimit::max(state.config.http.max_upload_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ));

    // Liveness check at both the root and the conventional path
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/health", get(health::health));

    let cors = build_cors_layer(&state.config.cors);

    Router::new()
        .merge(conversion_routes)
        .merge(health_routes)
        .with_state(state)
        .layer(cors)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
