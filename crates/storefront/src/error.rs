//! Unified error handling with Sentry integration.
//!
//! Relay handlers return `Result<T, AppError>`. Errors render as the JSON
//! envelope the client layer understands:
//!
//! ```json
//! { "statusCode": 502, "statusMessage": "Shopware API Error", "data": { "message": "..." } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::shopware::ShopwareError;

/// Application-level error type for the relay.
#[derive(Debug, Error)]
pub enum AppError {
    /// The upstream relay call failed.
    #[error("Shopware error: {0}")]
    Shopware(#[from] ShopwareError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body shared by relay failures and wrapped backend errors.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub status_message: String,
    pub data: Value,
}

impl ErrorEnvelope {
    /// Wrap a non-2xx backend answer, keeping its body as `data`.
    #[must_use]
    pub fn upstream(status: StatusCode, body: Value) -> Self {
        Self {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or("Error").to_string(),
            data: body,
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Shopware(ShopwareError::InvalidPath(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Shopware(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status_message(&self) -> String {
        match self {
            Self::Shopware(ShopwareError::InvalidPath(_)) => "Invalid Shopware path".to_string(),
            Self::Shopware(_) => "Shopware API Error".to_string(),
            _ => self
                .status()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }

    fn client_message(&self) -> String {
        match self {
            // Don't expose internal error details to clients
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Shopware(ShopwareError::InvalidAccessKey) => {
                "Relay is misconfigured".to_string()
            }
            Self::Shopware(err) => err.to_string(),
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let envelope = ErrorEnvelope {
            status_code: status.as_u16(),
            status_message: self.status_message(),
            data: json!({ "message": self.client_message() }),
        };

        (status, Json(envelope)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Call this after a successful login to associate errors with the customer.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a session transition.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("auth", "Customer logged in", Some(&[("customer_id", "0190...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb
                .data
                .insert((*key).to_string(), Value::String((*value).to_string()));
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
