//! Shopware 6 Store-API integration.
//!
//! # Architecture
//!
//! - The browser-facing client layer never talks to Shopware directly. It
//!   calls the same-origin relay (`/api/shopware/...`), which injects the
//!   sales channel access key server-side.
//! - Shopware is the source of truth for carts, customers and orders; no
//!   state is mirrored beyond what the client layer holds in memory.
//! - The `sw-context-token` header identifies the session in both
//!   directions and is passed through untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use furniture_storefront::shopware::{RelayClient, RelayRequest};
//!
//! let relay = RelayClient::new(&config.shopware)?;
//! let response = relay
//!     .forward(RelayRequest::new(Method::GET, "checkout/cart"))
//!     .await?;
//! ```

mod relay;
pub mod types;

pub use relay::{CONTEXT_TOKEN_HEADER, RelayClient, RelayRequest, RelayResponse};
pub use types::*;

use thiserror::Error;

/// Errors raised while relaying a request to Shopware.
#[derive(Debug, Error)]
pub enum ShopwareError {
    /// The upstream request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested sub-path is empty or tries to escape the API root.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The configured access key contains characters not allowed in a header.
    #[error("Access key is not a valid header value")]
    InvalidAccessKey,

    /// The upstream URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
