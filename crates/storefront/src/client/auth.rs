//! Auth manager.
//!
//! Tracks the durable customer the session is logged in as. Guest identities
//! created during checkout are never treated as a login.
//!
//! Login and registration fetch the full profile, then resync the cart and
//! then the wishlist. Logout clears the identity, then the wishlist's local
//! state, then resyncs the cart. Each follow-up step is best-effort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use furniture_core::AuthStatus;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::client::StorefrontError;
use crate::client::cart::{CartManager, customer_associations};
use crate::client::checkout::RegistrationForm;
use crate::client::gateway::{ApiGateway, ApiRequest};
use crate::client::identity::Identity;
use crate::client::wishlist::WishlistManager;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::shopware::{Address, Customer, ListResponse, LoginRequest, Order, RegisterRequest};

/// Default order history page size.
pub const DEFAULT_ORDER_LIMIT: u32 = 10;

#[derive(Debug, Default)]
struct AuthState {
    loading: bool,
    error: Option<String>,
    initialized: bool,
}

/// Login state of the session.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<AuthManagerInner>,
}

struct AuthManagerInner {
    gateway: ApiGateway,
    identity: Arc<Identity>,
    cart: CartManager,
    wishlist: WishlistManager,
    storefront_url: Option<String>,
    state: RwLock<AuthState>,
    init_started: AtomicBool,
}

impl AuthManager {
    #[must_use]
    pub fn new(
        gateway: ApiGateway,
        identity: Arc<Identity>,
        cart: CartManager,
        wishlist: WishlistManager,
        storefront_url: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AuthManagerInner {
                gateway,
                identity,
                cart,
                wishlist,
                storefront_url,
                state: RwLock::new(AuthState::default()),
                init_started: AtomicBool::new(false),
            }),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut AuthState) -> R) -> R {
        f(&mut self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    async fn tracked<T>(
        &self,
        op: impl Future<Output = Result<T, StorefrontError>>,
    ) -> Result<T, StorefrontError> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
        let result = op.await;
        self.update(|s| {
            s.loading = false;
            if let Err(e) = &result {
                s.error = Some(e.to_string());
            }
        });
        result
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Restore the login from the stored session token. Runs at most once.
    pub async fn init(&self) {
        if self.inner.init_started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.fetch_customer().await;
        self.update(|s| s.initialized = true);
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::MissingCredentials`] for blank input,
    /// [`StorefrontError::CustomerUnavailable`] if the profile cannot be
    /// loaded afterwards, or the backend failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Customer, StorefrontError> {
        self.tracked(async {
            let email = email.trim();
            if email.is_empty() || password.is_empty() {
                return Err(StorefrontError::MissingCredentials);
            }

            let request = LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            };
            self.inner
                .gateway
                .execute(ApiRequest::post("account/login").json(serde_json::to_value(&request)?))
                .await?;

            self.complete_login().await
        })
        .await
    }

    /// Create a durable account and log in.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::MissingStorefrontUrl`] when no sales
    /// channel domain is configured, [`StorefrontError::CustomerUnavailable`]
    /// if the profile cannot be loaded afterwards, or the backend failure.
    #[instrument(skip(self, form))]
    pub async fn register(&self, form: &RegistrationForm) -> Result<Customer, StorefrontError> {
        self.tracked(async {
            let storefront_url = self
                .inner
                .storefront_url
                .clone()
                .ok_or(StorefrontError::MissingStorefrontUrl)?;
            let profile = &form.profile;

            let request = RegisterRequest {
                guest: false,
                email: profile.email.trim().to_string(),
                password: Some(form.password.clone()),
                salutation_id: profile.salutation_id.clone(),
                first_name: profile.first_name.trim().to_string(),
                last_name: profile.last_name.trim().to_string(),
                storefront_url,
                accepted_data_protection: true,
                billing_address: profile.to_address_input(profile.salutation_id.clone()),
            };
            self.inner
                .gateway
                .execute(ApiRequest::post("account/register").json(serde_json::to_value(&request)?))
                .await?;

            self.complete_login().await
        })
        .await
    }

    /// Profile fetch, cart resync, wishlist merge.
    async fn complete_login(&self) -> Result<Customer, StorefrontError> {
        let customer = self
            .fetch_customer()
            .await
            .ok_or(StorefrontError::CustomerUnavailable)?;

        self.inner.cart.resync().await;
        self.inner.wishlist.sync().await;

        set_sentry_user(&customer.id, Some(&customer.email));
        add_breadcrumb("auth", "Customer logged in", None);
        info!(customer_id = %customer.id, "Customer logged in");
        Ok(customer)
    }

    /// Log out.
    ///
    /// Local cleanup and the cart resync run even if the backend call fails;
    /// that failure is held and returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns the backend logout failure.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), StorefrontError> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .inner
            .gateway
            .execute(ApiRequest::post("account/logout").json(json!({})))
            .await
            .map(|_| ());
        if let Err(e) = &result {
            warn!(error = %e, "Logout call failed, clearing local session anyway");
        }

        self.inner.identity.clear();
        self.inner.wishlist.clear_on_logout();
        self.inner.cart.resync().await;

        clear_sentry_user();
        add_breadcrumb("auth", "Customer logged out", None);
        info!("Customer logged out");

        self.update(|s| {
            s.loading = false;
            if let Err(e) = &result {
                s.error = Some(e.to_string());
            }
        });
        result
    }

    // =========================================================================
    // Profile & orders
    // =========================================================================

    /// Load the logged-in customer with addresses.
    ///
    /// Returns `None` without a session token, for guest identities and on
    /// failure. 401/403 answers mean "not logged in" and are not held as an
    /// error.
    pub async fn fetch_customer(&self) -> Option<Customer> {
        if self.inner.gateway.context_token().is_none() {
            debug!("No context token, not logged in");
            self.inner.identity.clear();
            return None;
        }

        match self
            .inner
            .gateway
            .call::<Customer>(ApiRequest::post("account/customer").json(customer_associations()))
            .await
        {
            Ok(customer) if customer.guest => {
                debug!("Session belongs to a guest identity");
                self.inner.identity.clear();
                None
            }
            Ok(customer) => {
                self.inner.identity.set(Some(customer.clone()));
                Some(customer)
            }
            Err(e) => {
                self.inner.identity.clear();
                if !e.is_unauthorized() {
                    warn!(error = %e, "Failed to load customer");
                    self.update(|s| s.error = Some(e.to_string()));
                }
                None
            }
        }
    }

    /// One page of the customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self))]
    pub async fn fetch_orders(&self, page: u32, limit: u32) -> Result<ListResponse<Order>, StorefrontError> {
        self.tracked(async {
            let body = json!({
                "page": page.max(1),
                "limit": if limit == 0 { DEFAULT_ORDER_LIMIT } else { limit },
                "sort": [{"field": "orderDateTime", "order": "DESC"}],
                "associations": {
                    "lineItems": {"associations": {"cover": {}}},
                    "deliveries": {"associations": {"shippingMethod": {}, "stateMachineState": {}}},
                    "transactions": {"associations": {"paymentMethod": {}, "stateMachineState": {}}},
                    "stateMachineState": {},
                    "billingAddress": {"associations": {"country": {}}}
                }
            });
            self.inner
                .gateway
                .call(ApiRequest::post("order").json(body))
                .await
        })
        .await
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    #[must_use]
    pub fn customer(&self) -> Option<Customer> {
        self.inner.identity.customer()
    }

    /// Durable customer from the identity, else guest when the session
    /// context carries a registered guest.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        match self.inner.identity.status() {
            AuthStatus::Unauthenticated if self.inner.cart.has_guest_customer() => AuthStatus::Guest,
            status => status,
        }
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.identity.is_logged_in()
    }

    #[must_use]
    pub fn customer_name(&self) -> Option<String> {
        self.customer().map(|c| c.full_name())
    }

    #[must_use]
    pub fn customer_email(&self) -> Option<String> {
        self.customer().map(|c| c.email)
    }

    #[must_use]
    pub fn billing_address(&self) -> Option<Address> {
        self.customer()?.billing_address().cloned()
    }

    #[must_use]
    pub fn shipping_address(&self) -> Option<Address> {
        self.customer()?.shipping_address().cloned()
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.customer().map(|c| c.addresses).unwrap_or_default()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loading
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::token::SessionTokenStore;
    use crate::client::wishlist::WishlistMode;
    use crate::storage::{KeyValueStore, MemoryStore};
    use chrono::TimeDelta;
    use furniture_core::ContextToken;
    use serde_json::Value;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_for(server: &MockServer, with_token: bool) -> AuthManager {
        parts_for(server, with_token).0
    }

    fn parts_for(server: &MockServer, with_token: bool) -> (AuthManager, CartManager) {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let tokens = Arc::new(SessionTokenStore::new(
            Arc::clone(&storage),
            TimeDelta::days(30),
        ));
        if with_token {
            tokens.set(ContextToken::parse("tok-anon").unwrap());
        }
        let gateway = ApiGateway::new(Url::parse(&server.uri()).unwrap(), tokens);
        let identity = Arc::new(Identity::new());
        let cart = CartManager::new(gateway.clone(), None);
        let wishlist = WishlistManager::new(
            gateway.clone(),
            storage,
            Arc::clone(&identity),
            WishlistMode::Local,
        );
        let auth = AuthManager::new(gateway, identity, cart.clone(), wishlist, None);
        (auth, cart)
    }

    fn customer_body(guest: bool) -> Value {
        json!({
            "id": "c1",
            "email": "jane@example.com",
            "guest": guest,
            "firstName": "Jane",
            "lastName": "Doe",
            "defaultBillingAddress": {"id": "a1", "street": "Hauptstraße 1", "city": "Berlin"},
            "addresses": [{"id": "a1", "street": "Hauptstraße 1", "city": "Berlin"}]
        })
    }

    async fn mount_cart(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/checkout/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lineItems": []})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_fetches_profile_and_resyncs_cart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/login"))
            .and(body_json(json!({"email": "jane@example.com", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("sw-context-token", "tok-customer")
                    .set_body_json(json!({"contextToken": "tok-customer"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/account/customer"))
            .and(wiremock::matchers::header("sw-context-token", "tok-customer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(customer_body(false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/checkout/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lineItems": []})))
            .expect(1)
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        let customer = auth.login(" jane@example.com ", "secret").await.unwrap();

        assert_eq!(customer.email, "jane@example.com");
        assert!(auth.is_logged_in());
        assert_eq!(auth.status(), AuthStatus::Customer);
        assert_eq!(auth.customer_name().as_deref(), Some("Jane Doe"));
        assert_eq!(auth.billing_address().unwrap().city, "Berlin");
        assert_eq!(auth.addresses().len(), 1);
        assert!(auth.error().is_none());
        assert!(!auth.is_loading());
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let server = MockServer::start().await;
        let auth = manager_for(&server, true);

        let err = auth.login("  ", "secret").await.unwrap_err();
        assert!(matches!(err, StorefrontError::MissingCredentials));
        assert_eq!(auth.error(), Some(err.to_string()));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_holds_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errors": [{"detail": "Invalid username and/or password."}]
            })))
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        let err = auth.login("jane@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(auth.error().as_deref(), Some("Invalid username and/or password."));
        assert!(!auth.is_logged_in());
    }

    #[tokio::test]
    async fn test_guest_profile_is_not_a_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/customer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(customer_body(true)))
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        assert!(auth.fetch_customer().await.is_none());
        assert!(!auth.is_logged_in());
        assert_eq!(auth.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_session_guest_reports_guest_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-anon",
                "customer": customer_body(true)
            })))
            .mount(&server)
            .await;

        let (auth, cart) = parts_for(&server, true);
        assert_eq!(auth.status(), AuthStatus::Unauthenticated);

        cart.fetch_context().await.unwrap();
        assert_eq!(auth.status(), AuthStatus::Guest);
        assert!(!auth.is_logged_in());
    }

    #[tokio::test]
    async fn test_fetch_customer_without_token_skips_backend() {
        let server = MockServer::start().await;
        let auth = manager_for(&server, false);

        assert!(auth.fetch_customer().await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_profile_is_silent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/customer"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errors": [{"code": "CHECKOUT__CUSTOMER_NOT_LOGGED_IN"}]
            })))
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        assert!(auth.fetch_customer().await.is_none());
        assert!(auth.error().is_none());
    }

    #[tokio::test]
    async fn test_init_runs_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/customer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(customer_body(false)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        auth.init().await;
        auth.init().await;
        assert!(auth.is_initialized());
        assert!(auth.is_logged_in());
    }

    #[tokio::test]
    async fn test_logout_cleans_up_even_when_backend_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/account/customer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(customer_body(false)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/account/logout"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "Boom"})))
            .mount(&server)
            .await;
        mount_cart(&server).await;

        let auth = manager_for(&server, true);
        auth.init().await;
        assert!(auth.is_logged_in());

        let err = auth.logout().await.unwrap_err();
        assert_eq!(err.to_string(), "Boom");
        assert!(!auth.is_logged_in());
        assert_eq!(auth.error().as_deref(), Some("Boom"));

        let cart_fetches = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/checkout/cart")
            .count();
        assert_eq!(cart_fetches, 1);
    }

    #[tokio::test]
    async fn test_fetch_orders_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(wiremock::matchers::body_partial_json(json!({"page": 2, "limit": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 11,
                "page": 2,
                "limit": 10,
                "elements": [{"id": "o11", "orderNumber": "10011", "amountTotal": 59.9}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = manager_for(&server, true);
        let orders = auth.fetch_orders(2, 0).await.unwrap();
        assert_eq!(orders.total, 11);
        assert_eq!(orders.elements[0].order_number, "10011");
    }
}
