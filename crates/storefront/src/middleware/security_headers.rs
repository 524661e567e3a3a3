//! Security headers middleware.
//!
//! The relay only serves JSON, so the policy is small: no MIME sniffing, no
//! referrer leakage and a configurable framing policy.

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue,
        header::{CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::state::AppState;

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy: frame-ancestors <configured>`
/// - `X-Frame-Options: DENY`, only when framing is disallowed entirely
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let config = state.config();
    let headers = response.headers_mut();

    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    match HeaderValue::from_str(&format!("frame-ancestors {}", config.frame_ancestors)) {
        Ok(csp) => {
            headers.insert(CONTENT_SECURITY_POLICY, csp);
        }
        Err(_) => {
            warn!(frame_ancestors = %config.frame_ancestors, "Invalid frame-ancestors value");
            headers.insert(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("frame-ancestors 'none'"),
            );
        }
    }

    // X-Frame-Options cannot express an allow-list, so it is only sent
    // when no embedding is allowed at all.
    if config.denies_framing() {
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    }

    response
}
