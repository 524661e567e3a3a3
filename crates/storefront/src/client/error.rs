//! Client layer errors.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::client::checkout::CheckoutField;
use crate::storage::StorageError;

/// Errors surfaced by the storefront client layer.
///
/// Transport and backend failures share one shape so callers can branch on
/// [`StorefrontError::status`]; local precondition failures are separate
/// variants and never reach the network.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("{message}")]
    Api {
        /// HTTP status of the backend response.
        status: u16,
        /// Human-readable message assembled from the backend error list.
        message: String,
    },

    /// A response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Order placement without a customer in the session context.
    #[error("No customer registered for this session. Please fill in the checkout form.")]
    NoCustomer,

    /// Order placement with an empty cart.
    #[error("The cart is empty.")]
    EmptyCart,

    /// Login attempted without email or password.
    #[error("Email and password are required.")]
    MissingCredentials,

    /// Login succeeded but the customer profile could not be loaded.
    #[error("Customer data could not be loaded.")]
    CustomerUnavailable,

    /// Line item quantities start at 1.
    #[error("Quantity must be at least 1 (got {0}).")]
    InvalidQuantity(u32),

    /// Registration needs the sales channel domain.
    #[error("Shopware storefront URL not configured.")]
    MissingStorefrontUrl,

    /// The relay base URL cannot be combined with the request path.
    #[error("Invalid relay URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// Checkout form validation failed.
    #[error("Please correct the highlighted fields.")]
    InvalidForm(BTreeMap<CheckoutField, String>),
}

impl StorefrontError {
    /// HTTP status of a backend rejection.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Whether the backend answered 401 or 403 (no customer logged in).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
