//! HTTP route handlers for the relay.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! ANY  /api/shopware/{*path}   - Store-API relay
//! ANY  /api/shopware[/]        - 400 (no sub-path)
//! ```

pub mod shopware;

use axum::{
    Router,
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Create all routes for the relay.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Store-API relay
        .route("/api/shopware", any(shopware::missing_path))
        .route("/api/shopware/", any(shopware::missing_path))
        .route("/api/shopware/{*path}", any(shopware::forward))
}

/// The full application: routes, request IDs, security headers and tracing.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
pub async fn health() -> &'static str {
    "ok"
}
