//! Same-origin Store-API relay handler.
//!
//! The browser never sees the sales channel access key: it calls
//! `/api/shopware/<path>` and the relay forwards method, query and body to
//! the Store-API, adding the key. The `sw-context-token` header travels in
//! both directions.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use furniture_core::ContextToken;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, ErrorEnvelope, Result};
use crate::shopware::{CONTEXT_TOKEN_HEADER, RelayRequest, ShopwareError};
use crate::state::AppState;

/// Forward `/api/shopware/{*path}` upstream.
///
/// Successful answers return the backend body verbatim. Non-2xx answers keep
/// their status and wrap the backend body as `data` in the error envelope.
#[instrument(skip_all, fields(method = %method, path = %path))]
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let context_token = headers
        .get(CONTEXT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(ContextToken::parse);

    let upstream = state
        .relay()
        .forward(RelayRequest {
            method,
            path,
            query,
            context_token,
            body: Some(body),
        })
        .await?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = if !status.is_success() {
        (status, Json(ErrorEnvelope::upstream(status, upstream.body))).into_response()
    } else if upstream.body == Value::Null {
        (status, Body::empty()).into_response()
    } else {
        (status, Json(upstream.body)).into_response()
    };

    if let Some(token) = upstream.context_token
        && let Ok(value) = HeaderValue::from_str(token.as_str())
    {
        response.headers_mut().insert(CONTEXT_TOKEN_HEADER, value);
    }

    Ok(response)
}

/// `/api/shopware` without a sub-path.
pub async fn missing_path() -> AppError {
    AppError::Shopware(ShopwareError::InvalidPath(String::new()))
}
