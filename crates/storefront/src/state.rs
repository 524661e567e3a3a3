//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::shopware::{RelayClient, ShopwareError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    relay: RelayClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay client cannot be built from the
    /// Shopware configuration.
    pub fn new(config: StorefrontConfig) -> Result<Self, ShopwareError> {
        let relay = RelayClient::new(&config.shopware)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, relay }),
        })
    }

    /// Get a reference to the relay configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Store-API relay client.
    #[must_use]
    pub fn relay(&self) -> &RelayClient {
        &self.inner.relay
    }
}
