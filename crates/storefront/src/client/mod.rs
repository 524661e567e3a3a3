//! Client-side reconciliation layer.
//!
//! Keeps the session token, cart, login and wishlist of one storefront
//! session consistent with the commerce backend, reached through the
//! same-origin relay.
//!
//! # Architecture
//!
//! - [`SessionTokenStore`] holds the context token (memory plus durable
//!   storage); [`ApiGateway`] is the only writer, capturing the token from
//!   every response.
//! - [`CartManager`], [`AuthManager`] and [`WishlistManager`] each own their
//!   state and are cheap to clone.
//! - [`Storefront`] wires everything for one session and runs start-up.
//!
//! # Example
//!
//! ```rust,ignore
//! let storefront = Storefront::new(&ClientConfig::from_env()?)?;
//! storefront.start().await;
//! storefront.cart().add_item(&ProductId::new("0190..."), 1).await?;
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
mod error;
pub mod gateway;
pub mod identity;
pub mod token;
pub mod wishlist;

use std::sync::Arc;

pub use auth::AuthManager;
pub use cart::{CartManager, CartState};
pub use checkout::{Checkout, CheckoutField, CheckoutForm, OrderStep, RegistrationForm};
pub use error::StorefrontError;
pub use gateway::{ApiGateway, ApiRequest};
pub use identity::Identity;
pub use token::SessionTokenStore;
pub use wishlist::{LikedProduct, ProductSnapshot, WishlistManager, WishlistMode};

use tracing::info;

use crate::config::ClientConfig;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

/// One storefront session.
#[derive(Clone)]
pub struct Storefront {
    gateway: ApiGateway,
    cart: CartManager,
    auth: AuthManager,
    wishlist: WishlistManager,
    checkout: Checkout,
}

impl Storefront {
    /// Create a session using the configured data directory, or in-memory
    /// storage when none is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be opened.
    pub fn new(config: &ClientConfig) -> Result<Self, StorefrontError> {
        let storage: Arc<dyn KeyValueStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_storage(config, storage))
    }

    /// Create a session on top of the given durable storage.
    #[must_use]
    pub fn with_storage(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let tokens = Arc::new(SessionTokenStore::new(
            Arc::clone(&storage),
            config.token_max_age,
        ));
        let gateway = ApiGateway::new(config.relay_url.clone(), tokens);
        let identity = Arc::new(Identity::new());

        let cart = CartManager::new(gateway.clone(), config.storefront_url.clone());
        let wishlist = WishlistManager::new(
            gateway.clone(),
            storage,
            Arc::clone(&identity),
            config.wishlist_mode,
        );
        let auth = AuthManager::new(
            gateway.clone(),
            identity,
            cart.clone(),
            wishlist.clone(),
            config.storefront_url.clone(),
        );
        let checkout = Checkout::new(cart.clone(), auth.clone());

        Self {
            gateway,
            cart,
            auth,
            wishlist,
            checkout,
        }
    }

    /// Load the cart, restore the login, then load the wishlist.
    pub async fn start(&self) {
        self.cart.init_cart().await;
        self.auth.init().await;
        self.wishlist.initialize().await;
        info!(
            logged_in = self.auth.is_logged_in(),
            items = self.cart.item_count(),
            likes = self.wishlist.like_count(),
            "Storefront session started"
        );
    }

    #[must_use]
    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.cart
    }

    #[must_use]
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistManager {
        &self.wishlist
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_start_as_anonymous_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/shopware/checkout/cart"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("sw-context-token", "tok-anon")
                    .set_body_json(json!({"lineItems": []})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/shopware/account/customer"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errors": [{"code": "CHECKOUT__CUSTOMER_NOT_LOGGED_IN"}]
            })))
            .mount(&server)
            .await;

        let config = ClientConfig::new(
            Url::parse(&format!("{}/api/shopware", server.uri())).unwrap(),
        );
        let storefront = Storefront::new(&config).unwrap();
        storefront.start().await;

        assert!(!storefront.auth().is_logged_in());
        assert!(storefront.auth().is_initialized());
        assert!(storefront.cart().is_empty());
        assert_eq!(storefront.wishlist().like_count(), 0);
        assert_eq!(
            storefront.gateway().context_token().unwrap().as_str(),
            "tok-anon"
        );
    }

    #[test]
    fn test_file_backed_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new(Url::parse("http://127.0.0.1:3000/api/shopware").unwrap());
        config.data_dir = Some(dir.path().join("session"));

        let storefront = Storefront::new(&config).unwrap();
        assert!(storefront.gateway().context_token().is_none());
    }
}
