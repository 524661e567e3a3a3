//! Client-side API gateway.
//!
//! Every backend call from the client layer goes through [`ApiGateway`]:
//! it attaches the current context token, captures the token returned on
//! every response (success or failure) and turns backend error bodies into
//! one readable message.

use std::sync::Arc;

use furniture_core::ContextToken;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::StorefrontError;
use crate::client::token::SessionTokenStore;
use crate::shopware::CONTEXT_TOKEN_HEADER;

/// Fallback when a backend error body carries no usable message.
const UNKNOWN_ERROR: &str = "Unknown error";

// =============================================================================
// ApiRequest
// =============================================================================

/// A relative backend call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

// =============================================================================
// ApiGateway
// =============================================================================

/// Token-aware HTTP client for the relay.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<ApiGatewayInner>,
}

struct ApiGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<SessionTokenStore>,
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiGateway {
    /// Create a gateway that resolves request paths against `base_url`.
    #[must_use]
    pub fn new(base_url: Url, tokens: Arc<SessionTokenStore>) -> Self {
        Self {
            inner: Arc::new(ApiGatewayInner {
                client: reqwest::Client::new(),
                base_url,
                tokens,
            }),
        }
    }

    /// The session token store this gateway reads and writes.
    #[must_use]
    pub fn tokens(&self) -> &Arc<SessionTokenStore> {
        &self.inner.tokens
    }

    /// Current context token.
    #[must_use]
    pub fn context_token(&self) -> Option<ContextToken> {
        self.inner.tokens.get()
    }

    /// Perform a call and decode the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status (with the
    /// backend message) or a body that does not decode into `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, StorefrontError> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Perform a call and return the raw JSON body (null when empty).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, StorefrontError> {
        let url = self.request_url(&request)?;

        let mut builder = self
            .inner
            .client
            .request(request.method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(token) = self.inner.tokens.get() {
            builder = builder.header(CONTEXT_TOKEN_HEADER, token.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();

        // Capture rotation before looking at the status: failed calls rotate too.
        if let Some(token) = response
            .headers()
            .get(CONTEXT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(ContextToken::parse)
        {
            self.inner.tokens.set(token);
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text))
        };

        if !status.is_success() {
            let message = api_error_message(&body);
            warn!(status = %status, message = %message, "API call failed");
            return Err(StorefrontError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, "API call succeeded");
        Ok(body)
    }

    fn request_url(&self, request: &ApiRequest) -> Result<Url, StorefrontError> {
        let root = self.inner.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{root}/{path}"))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

/// Human-readable message from a backend error body.
///
/// Prefers the structured `errors` list (top level or under `data`, as the
/// relay wraps it), joining each entry's detail, title or code. Falls back to
/// a single message field, then to a generic text.
#[must_use]
pub fn api_error_message(body: &Value) -> String {
    let data = body.get("data").filter(|d| d.is_object());

    let errors = body
        .get("errors")
        .or_else(|| data.and_then(|d| d.get("errors")))
        .and_then(Value::as_array);

    if let Some(errors) = errors {
        let parts: Vec<&str> = errors
            .iter()
            .filter_map(|entry| {
                ["detail", "title", "code"]
                    .iter()
                    .filter_map(|field| entry.get(*field).and_then(Value::as_str))
                    .find(|s| !s.trim().is_empty())
            })
            .collect();
        if !parts.is_empty() {
            return parts.join(", ");
        }
    }

    [
        data.and_then(|d| d.get("message")),
        body.get("message"),
        body.get("statusMessage"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .find(|s| !s.trim().is_empty())
    .or_else(|| body.as_str().filter(|s| !s.trim().is_empty()))
    .map_or_else(|| UNKNOWN_ERROR.to_string(), str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeDelta;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> ApiGateway {
        let tokens = Arc::new(SessionTokenStore::new(
            Arc::new(MemoryStore::new()),
            TimeDelta::days(30),
        ));
        let base = Url::parse(&format!("{}/api/shopware", server.uri())).unwrap();
        ApiGateway::new(base, tokens)
    }

    #[test]
    fn test_error_message_joins_entries() {
        let body = json!({
            "errors": [
                {"code": "A", "title": "Not Found", "detail": "Product not found"},
                {"code": "B", "title": "Invalid quantity"},
                {"code": "C"}
            ]
        });
        assert_eq!(
            api_error_message(&body),
            "Product not found, Invalid quantity, C"
        );
    }

    #[test]
    fn test_error_message_inside_relay_envelope() {
        let body = json!({
            "statusCode": 400,
            "statusMessage": "Bad Request",
            "data": {"errors": [{"detail": "Email already in use"}]}
        });
        assert_eq!(api_error_message(&body), "Email already in use");

        let body = json!({
            "statusCode": 502,
            "statusMessage": "Shopware API Error",
            "data": {"message": "connection refused"}
        });
        assert_eq!(api_error_message(&body), "connection refused");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(api_error_message(&json!({"message": "Boom"})), "Boom");
        assert_eq!(
            api_error_message(&json!({"statusMessage": "Bad Gateway"})),
            "Bad Gateway"
        );
        assert_eq!(api_error_message(&json!({"errors": []})), UNKNOWN_ERROR);
        assert_eq!(api_error_message(&Value::Null), UNKNOWN_ERROR);
    }

    #[tokio::test]
    async fn test_call_attaches_and_captures_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shopware/shipping-method"))
            .and(query_param("onlyAvailable", "1"))
            .and(header("sw-context-token", "tok-1"))
            .and(body_json(json!({})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("sw-context-token", "tok-2")
                    .set_body_json(json!({"elements": [], "total": 0})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        gateway.tokens().set(ContextToken::parse("tok-1").unwrap());

        let body = gateway
            .execute(
                ApiRequest::post("shipping-method")
                    .query("onlyAvailable", "1")
                    .json(json!({})),
            )
            .await
            .unwrap();

        assert_eq!(body["total"], json!(0));
        assert_eq!(gateway.context_token().unwrap().as_str(), "tok-2");
    }

    #[tokio::test]
    async fn test_failed_call_still_captures_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shopware/account/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("sw-context-token", "rotated")
                    .set_body_json(json!({
                        "statusCode": 401,
                        "statusMessage": "Unauthorized",
                        "data": {"errors": [{"detail": "Invalid username and/or password."}]}
                    })),
            )
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .execute(ApiRequest::post("account/login").json(json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Invalid username and/or password.");
        assert_eq!(gateway.context_token().unwrap().as_str(), "rotated");
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/shopware/customer/wishlist/delete/p1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let result: Result<(), _> = gateway
            .call(ApiRequest::delete("customer/wishlist/delete/p1"))
            .await;
        assert!(result.is_ok());
    }
}
