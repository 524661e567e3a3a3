//! Server-side Store-API relay client.
//!
//! Forwards arbitrary sub-paths and methods to the configured Store-API root,
//! adding the sales channel access key and passing the context token through.

use std::sync::Arc;

use axum::body::Bytes;
use furniture_core::ContextToken;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ShopwareConfig;
use crate::shopware::ShopwareError;

/// Session token header, used in both directions.
pub const CONTEXT_TOKEN_HEADER: &str = "sw-context-token";

/// Sales channel access key header.
const ACCESS_KEY_HEADER: &str = "sw-access-key";

/// A request to relay upstream.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    /// Sub-path below the Store-API root, without a leading slash.
    pub path: String,
    /// Raw query string, forwarded verbatim.
    pub query: Option<String>,
    pub context_token: Option<ContextToken>,
    pub body: Option<Bytes>,
}

impl RelayRequest {
    /// Create a body-less request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            context_token: None,
            body: None,
        }
    }
}

/// The upstream answer, already decoded.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: u16,
    /// Token returned by Shopware, if any.
    pub context_token: Option<ContextToken>,
    /// JSON body; non-JSON bodies arrive as a JSON string, empty ones as null.
    pub body: Value,
}

impl RelayResponse {
    /// Whether the upstream status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Client for the Shopware Store-API.
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<RelayClientInner>,
}

struct RelayClientInner {
    client: reqwest::Client,
    api_url: Url,
    access_key: HeaderValue,
}

impl RelayClient {
    /// Create a relay client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the access key cannot be sent as a header value.
    pub fn new(config: &ShopwareConfig) -> Result<Self, ShopwareError> {
        let mut access_key = HeaderValue::from_str(config.access_key.expose_secret())
            .map_err(|_| ShopwareError::InvalidAccessKey)?;
        access_key.set_sensitive(true);

        Ok(Self {
            inner: Arc::new(RelayClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.clone(),
                access_key,
            }),
        })
    }

    /// Store-API root this client forwards to.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.inner.api_url
    }

    /// Forward one request upstream.
    ///
    /// Non-2xx responses are returned as `Ok`; only transport failures and
    /// invalid paths are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is rejected or the upstream call fails.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn forward(&self, request: RelayRequest) -> Result<RelayResponse, ShopwareError> {
        let url = self.upstream_url(&request.path, request.query.as_deref())?;
        debug!(url = %url, "Relaying request to Shopware");

        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(ACCESS_KEY_HEADER, self.inner.access_key.clone());

        if let Some(token) = &request.context_token {
            debug!(token = %token.preview(), "Using context token");
            builder = builder.header(CONTEXT_TOKEN_HEADER, token.as_str());
        }

        if carries_body(&request.method)
            && let Some(body) = request.body.filter(|b| !b.is_empty())
        {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let context_token = response
            .headers()
            .get(CONTEXT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(ContextToken::parse);

        let text = response.text().await?;
        let body = decode_body(&text);

        if let Some(token) = &context_token {
            debug!(token = %token.preview(), "Response context token");
        }
        if !(200..300).contains(&status) {
            warn!(
                status,
                body = %text.chars().take(500).collect::<String>(),
                "Shopware returned non-success status"
            );
        }

        Ok(RelayResponse {
            status,
            context_token,
            body,
        })
    }

    /// Join the validated sub-path onto the API root.
    fn upstream_url(&self, path: &str, query: Option<&str>) -> Result<Url, ShopwareError> {
        let path = validate_path(path)?;
        let root = self.inner.api_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{root}/{path}"))?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }
}

/// Methods whose body is forwarded upstream.
fn carries_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PATCH | Method::PUT | Method::DELETE
    )
}

/// Reject empty paths and dot segments (also percent-encoded ones).
fn validate_path(path: &str) -> Result<&str, ShopwareError> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(ShopwareError::InvalidPath(String::new()));
    }

    let escapes = path.split('/').any(|segment| {
        let decoded = urlencoding::decode(segment).map_or_else(
            |_| segment.to_owned(),
            std::borrow::Cow::into_owned,
        );
        decoded == ".." || decoded == "." || decoded.contains('\\')
    });
    if escapes || path.contains("://") {
        return Err(ShopwareError::InvalidPath(path.to_owned()));
    }

    Ok(path)
}

/// Decode an upstream body: JSON if possible, otherwise the raw text.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}
