//! Cart manager.
//!
//! Holds the session cart plus the shipping/payment/country/salutation
//! catalogs the checkout needs. Every mutating call replaces the local cart
//! with the full representation the backend returns; nothing is merged
//! locally, so totals and taxes always match the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use furniture_core::{AddressId, LineItemId, PaymentMethodId, ProductId, SalutationId, ShippingMethodId};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::client::StorefrontError;
use crate::client::checkout::CheckoutForm;
use crate::client::gateway::{ApiGateway, ApiRequest};
use crate::shopware::{
    Cart, Country, Customer, ListResponse, Order, PaymentMethod, RegisterRequest,
    SalesChannelContext, Salutation, ShippingMethod,
};

/// Associations requested with every customer profile fetch.
pub(crate) fn customer_associations() -> Value {
    let address = json!({"associations": {"country": {}, "countryState": {}}});
    json!({
        "associations": {
            "defaultBillingAddress": address,
            "defaultShippingAddress": address,
            "activeBillingAddress": address,
            "activeShippingAddress": address,
            "addresses": address,
            "salutation": {}
        }
    })
}

// =============================================================================
// State
// =============================================================================

/// Snapshot of the cart manager's state.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    pub cart: Option<Cart>,
    pub loading: bool,
    /// Message of the last failed operation, cleared on the next attempt.
    pub error: Option<String>,
    pub shipping_methods: Vec<ShippingMethod>,
    pub payment_methods: Vec<PaymentMethod>,
    pub countries: Vec<Country>,
    pub salutations: Vec<Salutation>,
    pub selected_shipping_method_id: Option<ShippingMethodId>,
    pub selected_payment_method_id: Option<PaymentMethodId>,
    pub initialized: bool,
    /// Customer attached to the session context (guest or durable).
    pub customer: Option<Customer>,
}

impl CartState {
    fn apply_cart(&mut self, cart: Cart) {
        if let Some(method) = cart.shipping_method() {
            self.selected_shipping_method_id = Some(method.id.clone());
        }
        if let Some(method) = cart.payment_method() {
            self.selected_payment_method_id = Some(method.id.clone());
        }
        self.cart = Some(cart);
        self.initialized = true;
    }

    fn reset_session(&mut self) {
        self.cart = None;
        self.initialized = false;
        self.selected_shipping_method_id = None;
        self.selected_payment_method_id = None;
        self.customer = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CatalogKey {
    Countries,
    Salutations,
}

#[derive(Debug, Clone)]
enum CatalogValue {
    Countries(Vec<Country>),
    Salutations(Vec<Salutation>),
}

/// Resets the in-flight flag when the guarded fetch ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// CartManager
// =============================================================================

/// Session cart and checkout catalogs.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    gateway: ApiGateway,
    storefront_url: Option<String>,
    state: RwLock<CartState>,
    fetching: AtomicBool,
    catalogs: Cache<CatalogKey, CatalogValue>,
}

impl CartManager {
    /// Create a cart manager. `storefront_url` is required only for guest
    /// registration.
    #[must_use]
    pub fn new(gateway: ApiGateway, storefront_url: Option<String>) -> Self {
        let catalogs = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CartManagerInner {
                gateway,
                storefront_url,
                state: RwLock::new(CartState::default()),
                fetching: AtomicBool::new(false),
                catalogs,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CartState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut CartState) -> R) -> R {
        f(&mut self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `op` with the loading flag set and record its failure.
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

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// Load the cart once per session.
    ///
    /// A call made while another initialization is in flight returns
    /// immediately. Failures are recorded in the held error, not returned.
    #[instrument(skip(self))]
    pub async fn init_cart(&self) {
        {
            let state = self.read();
            if state.initialized && state.cart.is_some() {
                return;
            }
        }

        if self
            .inner
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Cart fetch already in flight");
            return;
        }
        let _in_flight = InFlight(&self.inner.fetching);

        if let Err(e) = self.tracked(self.fetch_cart()).await {
            error!(error = %e, "Cart initialization failed");
        }
    }

    /// Fetch the cart and replace local state.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport failure; the held error is set too.
    pub async fn fetch_cart(&self) -> Result<Cart, StorefrontError> {
        match self.inner.gateway.call::<Cart>(ApiRequest::get("checkout/cart")).await {
            Ok(cart) => {
                debug!(line_items = cart.line_items.len(), "Cart loaded");
                self.update(|s| s.apply_cart(cart.clone()));
                Ok(cart)
            }
            Err(e) => {
                self.update(|s| s.error = Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Fetch the cart unless one with line items is already held.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn ensure_cart_loaded(&self) -> Result<Cart, StorefrontError> {
        let held = self
            .read()
            .cart
            .clone()
            .filter(|cart| !cart.line_items.is_empty());
        match held {
            Some(cart) => Ok(cart),
            None => self.fetch_cart().await,
        }
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidQuantity`] for zero, or the backend
    /// failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart, StorefrontError> {
        self.tracked(async {
            if quantity == 0 {
                return Err(StorefrontError::InvalidQuantity(quantity));
            }
            let body = json!({
                "items": [{
                    "id": product_id,
                    "referencedId": product_id,
                    "type": "product",
                    "quantity": quantity
                }]
            });
            let cart: Cart = self
                .inner
                .gateway
                .call(ApiRequest::post("checkout/cart/line-item").json(body))
                .await?;
            info!(quantity, "Added to cart");
            self.update(|s| s.apply_cart(cart.clone()));
            Ok(cart)
        })
        .await
    }

    /// Change the quantity of a line item.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidQuantity`] for zero, or the backend
    /// failure.
    #[instrument(skip(self), fields(line_item_id = %line_item_id))]
    pub async fn update_quantity(
        &self,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, StorefrontError> {
        self.tracked(async {
            if quantity == 0 {
                return Err(StorefrontError::InvalidQuantity(quantity));
            }
            let body = json!({"items": [{"id": line_item_id, "quantity": quantity}]});
            let cart: Cart = self
                .inner
                .gateway
                .call(ApiRequest::patch("checkout/cart/line-item").json(body))
                .await?;
            self.update(|s| s.apply_cart(cart.clone()));
            Ok(cart)
        })
        .await
    }

    /// Remove line items.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn remove_items(&self, ids: &[LineItemId]) -> Result<Cart, StorefrontError> {
        if ids.is_empty() {
            return self.ensure_cart_loaded().await;
        }
        self.tracked(async {
            let cart: Cart = self
                .inner
                .gateway
                .call(ApiRequest::delete("checkout/cart/line-item").json(json!({"ids": ids})))
                .await?;
            self.update(|s| s.apply_cart(cart.clone()));
            Ok(cart)
        })
        .await
    }

    /// Remove a single line item.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn remove_item(&self, id: &LineItemId) -> Result<Cart, StorefrontError> {
        self.remove_items(std::slice::from_ref(id)).await
    }

    /// Remove every line item. Returns `None` when the cart was already empty.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn clear_cart(&self) -> Result<Option<Cart>, StorefrontError> {
        let ids: Vec<LineItemId> = self
            .read()
            .cart
            .as_ref()
            .map(|cart| cart.line_items.iter().map(|item| item.id.clone()).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Ok(None);
        }
        self.remove_items(&ids).await.map(Some)
    }

    /// Drop the local cart and fetch a fresh one (after login or logout).
    pub async fn resync(&self) {
        self.update(|s| {
            s.cart = None;
            s.initialized = false;
        });
        if let Err(e) = self.fetch_cart().await {
            warn!(error = %e, "Cart resync failed");
        }
    }

    // -------------------------------------------------------------------------
    // Shipping & payment
    // -------------------------------------------------------------------------

    /// Shipping methods available for the current context.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn fetch_shipping_methods(&self) -> Result<Vec<ShippingMethod>, StorefrontError> {
        let methods: ListResponse<ShippingMethod> = self
            .inner
            .gateway
            .call(
                ApiRequest::post("shipping-method")
                    .query("onlyAvailable", "1")
                    .json(json!({})),
            )
            .await?;
        self.update(|s| s.shipping_methods.clone_from(&methods.elements));
        Ok(methods.elements)
    }

    /// Payment methods available for the current context.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn fetch_payment_methods(&self) -> Result<Vec<PaymentMethod>, StorefrontError> {
        let methods: ListResponse<PaymentMethod> = self
            .inner
            .gateway
            .call(
                ApiRequest::post("payment-method")
                    .query("onlyAvailable", "1")
                    .json(json!({})),
            )
            .await?;
        self.update(|s| s.payment_methods.clone_from(&methods.elements));
        Ok(methods.elements)
    }

    /// Select the shipping method and reload the cart with new costs.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self), fields(shipping_method_id = %id))]
    pub async fn set_shipping_method(&self, id: &ShippingMethodId) -> Result<Cart, StorefrontError> {
        self.patch_context(json!({"shippingMethodId": id})).await?;
        self.update(|s| s.selected_shipping_method_id = Some(id.clone()));
        self.fetch_cart().await
    }

    /// Select the payment method and reload the cart.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self), fields(payment_method_id = %id))]
    pub async fn set_payment_method(&self, id: &PaymentMethodId) -> Result<Cart, StorefrontError> {
        self.patch_context(json!({"paymentMethodId": id})).await?;
        self.update(|s| s.selected_payment_method_id = Some(id.clone()));
        self.fetch_cart().await
    }

    async fn patch_context(&self, body: Value) -> Result<(), StorefrontError> {
        self.inner
            .gateway
            .execute(ApiRequest::patch("context").json(body))
            .await
            .map(|_| ())
            .inspect_err(|e| self.update(|s| s.error = Some(e.to_string())))
    }

    // -------------------------------------------------------------------------
    // Reference catalogs
    // -------------------------------------------------------------------------

    /// Active, shippable countries sorted by position. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn fetch_countries(&self) -> Result<Vec<Country>, StorefrontError> {
        if let Some(CatalogValue::Countries(countries)) =
            self.inner.catalogs.get(&CatalogKey::Countries).await
        {
            self.update(|s| s.countries.clone_from(&countries));
            return Ok(countries);
        }

        let response: ListResponse<Country> = self
            .inner
            .gateway
            .call(ApiRequest::post("country").json(json!({"associations": {"states": {}}})))
            .await?;
        let mut countries: Vec<Country> = response
            .elements
            .into_iter()
            .filter(|c| c.active && c.shipping_available)
            .collect();
        countries.sort_by_key(|c| c.position);

        self.inner
            .catalogs
            .insert(CatalogKey::Countries, CatalogValue::Countries(countries.clone()))
            .await;
        self.update(|s| s.countries.clone_from(&countries));
        Ok(countries)
    }

    /// Salutations. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn fetch_salutations(&self) -> Result<Vec<Salutation>, StorefrontError> {
        if let Some(CatalogValue::Salutations(salutations)) =
            self.inner.catalogs.get(&CatalogKey::Salutations).await
        {
            self.update(|s| s.salutations.clone_from(&salutations));
            return Ok(salutations);
        }

        let response: ListResponse<Salutation> = self
            .inner
            .gateway
            .call(ApiRequest::post("salutation").json(json!({})))
            .await?;
        let salutations = response.elements;

        self.inner
            .catalogs
            .insert(
                CatalogKey::Salutations,
                CatalogValue::Salutations(salutations.clone()),
            )
            .await;
        self.update(|s| s.salutations.clone_from(&salutations));
        Ok(salutations)
    }

    /// The explicit salutation, else "not specified", else the first one.
    async fn resolve_salutation(&self, explicit: Option<&SalutationId>) -> Option<SalutationId> {
        if let Some(id) = explicit.filter(|id| !id.as_str().is_empty()) {
            return Some(id.clone());
        }

        if self.read().salutations.is_empty()
            && let Err(e) = self.fetch_salutations().await
        {
            warn!(error = %e, "Could not load salutations for registration");
        }

        let state = self.read();
        state
            .salutations
            .iter()
            .find(|s| s.is_not_specified())
            .or_else(|| state.salutations.first())
            .map(|s| s.id.clone())
    }

    // -------------------------------------------------------------------------
    // Customer & context
    // -------------------------------------------------------------------------

    /// Register the checkout data as a guest identity and reload the cart.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::MissingStorefrontUrl`] when no sales
    /// channel domain is configured, or the backend failure.
    #[instrument(skip(self, form))]
    pub async fn register_guest(&self, form: &CheckoutForm) -> Result<Customer, StorefrontError> {
        let storefront_url = self
            .inner
            .storefront_url
            .clone()
            .ok_or(StorefrontError::MissingStorefrontUrl)?;
        let salutation_id = self.resolve_salutation(form.salutation_id.as_ref()).await;

        let request = RegisterRequest {
            guest: true,
            email: form.email.trim().to_string(),
            password: None,
            salutation_id: salutation_id.clone(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            storefront_url,
            accepted_data_protection: true,
            billing_address: form.to_address_input(salutation_id),
        };

        let customer: Customer = self
            .inner
            .gateway
            .call(ApiRequest::post("account/register").json(serde_json::to_value(&request)?))
            .await?;
        info!(customer_id = %customer.id, "Guest registered");

        self.update(|s| s.customer = Some(customer.clone()));
        self.fetch_cart().await?;
        Ok(customer)
    }

    /// Fetch the session context and record its customer, if any.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn fetch_context(&self) -> Result<SalesChannelContext, StorefrontError> {
        let context: SalesChannelContext = self
            .inner
            .gateway
            .call(ApiRequest::get("context"))
            .await?;
        if let Some(customer) = &context.customer {
            self.update(|s| s.customer = Some(customer.clone()));
        }
        Ok(context)
    }

    /// Session customer with addresses; `None` if it cannot be loaded.
    pub async fn fetch_customer_with_addresses(&self) -> Option<Customer> {
        match self
            .inner
            .gateway
            .call::<Customer>(ApiRequest::post("account/customer").json(customer_associations()))
            .await
        {
            Ok(customer) => {
                self.update(|s| s.customer = Some(customer.clone()));
                Some(customer)
            }
            Err(e) => {
                warn!(error = %e, "Could not load customer addresses");
                None
            }
        }
    }

    /// Overwrite an existing address with the form data.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self, form), fields(address_id = %address_id))]
    pub async fn update_billing_address(
        &self,
        form: &CheckoutForm,
        address_id: &AddressId,
    ) -> Result<Value, StorefrontError> {
        let input = form.to_address_input(form.salutation_id.clone());
        self.inner
            .gateway
            .execute(
                ApiRequest::patch(format!("account/address/{address_id}"))
                    .json(serde_json::to_value(&input)?),
            )
            .await
    }

    /// Use an address as billing address for the current context.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn set_active_billing_address(&self, address_id: &AddressId) -> Result<(), StorefrontError> {
        self.patch_context(json!({"billingAddressId": address_id})).await
    }

    // -------------------------------------------------------------------------
    // Order
    // -------------------------------------------------------------------------

    /// Place the order for the current cart.
    ///
    /// The session context must carry a customer (checked first) and the
    /// cart must hold at least one line item. On success the cart, the
    /// selections and the customer marker are reset so the next access loads
    /// a fresh cart.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::NoCustomer`], [`StorefrontError::EmptyCart`]
    /// or the backend failure.
    #[instrument(skip(self))]
    pub async fn place_order(&self) -> Result<Order, StorefrontError> {
        self.tracked(async {
            let context = self.fetch_context().await?;
            if context.customer.is_none() {
                return Err(StorefrontError::NoCustomer);
            }
            if self.is_empty() {
                return Err(StorefrontError::EmptyCart);
            }

            let order: Order = self
                .inner
                .gateway
                .call(ApiRequest::post("checkout/order").json(json!({})))
                .await?;
            info!(order_number = %order.order_number, "Order placed");

            self.update(CartState::reset_session);
            Ok(order)
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Derived values
    // -------------------------------------------------------------------------

    /// Snapshot of the full state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.read().clone()
    }

    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.read().cart.clone()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Sum of line item quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.read()
            .cart
            .as_ref()
            .map_or(0, |cart| cart.line_items.iter().map(|item| item.quantity).sum())
    }

    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.read()
            .cart
            .as_ref()
            .and_then(|cart| cart.price.as_ref())
            .map_or(Decimal::ZERO, |price| price.total_price)
    }

    /// Sum of line item prices before shipping.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.read()
            .cart
            .as_ref()
            .and_then(|cart| cart.price.as_ref())
            .map_or(Decimal::ZERO, |price| price.position_price)
    }

    /// Shipping costs of the first delivery.
    #[must_use]
    pub fn shipping_costs(&self) -> Decimal {
        self.read()
            .cart
            .as_ref()
            .and_then(|cart| cart.deliveries.first())
            .and_then(|delivery| delivery.shipping_costs.as_ref())
            .map_or(Decimal::ZERO, |costs| costs.total_price)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read()
            .cart
            .as_ref()
            .is_none_or(|cart| cart.line_items.is_empty())
    }

    #[must_use]
    pub fn selected_shipping_method_id(&self) -> Option<ShippingMethodId> {
        self.read().selected_shipping_method_id.clone()
    }

    #[must_use]
    pub fn selected_payment_method_id(&self) -> Option<PaymentMethodId> {
        self.read().selected_payment_method_id.clone()
    }

    /// The selected shipping method, from the catalog or the cart.
    #[must_use]
    pub fn selected_shipping_method(&self) -> Option<ShippingMethod> {
        let state = self.read();
        let id = state.selected_shipping_method_id.as_ref()?;
        state
            .shipping_methods
            .iter()
            .find(|m| &m.id == id)
            .or_else(|| {
                state
                    .cart
                    .as_ref()
                    .and_then(Cart::shipping_method)
                    .filter(|m| &m.id == id)
            })
            .cloned()
    }

    /// The selected payment method, from the catalog or the cart.
    #[must_use]
    pub fn selected_payment_method(&self) -> Option<PaymentMethod> {
        let state = self.read();
        let id = state.selected_payment_method_id.as_ref()?;
        state
            .payment_methods
            .iter()
            .find(|m| &m.id == id)
            .or_else(|| {
                state
                    .cart
                    .as_ref()
                    .and_then(Cart::payment_method)
                    .filter(|m| &m.id == id)
            })
            .cloned()
    }

    /// Whether the session context carries a customer (guest or durable).
    #[must_use]
    pub fn is_customer_registered(&self) -> bool {
        self.read().customer.is_some()
    }

    /// Whether the session customer is a guest identity.
    #[must_use]
    pub fn has_guest_customer(&self) -> bool {
        self.read().customer.as_ref().is_some_and(|c| c.guest)
    }
}
