//! Wire types for the Shopware 6 Store-API.
//!
//! Only the fields the client layer reads are modelled. Every struct is
//! lenient (`#[serde(default)]`) because the backend omits or nulls fields
//! depending on associations and sales channel settings.

use core::fmt;

use furniture_core::{
    AddressId, AuthStatus, CountryId, CountryStateId, CustomerId, LineItemId, OrderId,
    PaymentMethodId, ProductId, SalutationId, ShippingMethodId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Price Types
// =============================================================================

/// One tax position of a calculated price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalculatedTax {
    pub tax: Decimal,
    pub tax_rate: Decimal,
    pub price: Decimal,
}

/// Backend-computed price of a line item, delivery or transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalculatedPrice {
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total_price: Decimal,
    pub calculated_taxes: Vec<CalculatedTax>,
}

/// Aggregate cart price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartPrice {
    pub net_price: Decimal,
    pub total_price: Decimal,
    /// Sum of line items before shipping.
    pub position_price: Decimal,
    pub raw_total: Decimal,
    pub tax_status: Option<String>,
    pub calculated_taxes: Vec<CalculatedTax>,
}

// =============================================================================
// Media Types
// =============================================================================

/// A media reference (image URL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Media {
    pub url: String,
    pub alt: Option<String>,
}

/// Product cover wrapper as returned with the `cover.media` association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductMedia {
    pub media: Option<Media>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// A cart position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineItem {
    pub id: LineItemId,
    pub referenced_id: Option<String>,
    pub label: Option<String>,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub item_type: String,
    pub good: bool,
    pub removable: bool,
    pub stackable: bool,
    pub cover: Option<Media>,
    pub price: Option<CalculatedPrice>,
    pub payload: Option<serde_json::Value>,
}

/// A delivery position (one per shipping method / location).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Delivery {
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_costs: Option<CalculatedPrice>,
}

/// A payment transaction attached to the cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transaction {
    pub payment_method: Option<PaymentMethod>,
    pub amount: Option<CalculatedPrice>,
}

/// The session cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cart {
    pub token: Option<String>,
    pub name: Option<String>,
    pub price: Option<CartPrice>,
    pub line_items: Vec<LineItem>,
    pub deliveries: Vec<Delivery>,
    pub transactions: Vec<Transaction>,
    /// Cart validation messages, keyed by error id.
    pub errors: serde_json::Value,
    pub customer_comment: Option<String>,
}

impl Cart {
    /// Shipping method of the first delivery.
    #[must_use]
    pub fn shipping_method(&self) -> Option<&ShippingMethod> {
        self.deliveries.first()?.shipping_method.as_ref()
    }

    /// Payment method of the first transaction.
    #[must_use]
    pub fn payment_method(&self) -> Option<&PaymentMethod> {
        self.transactions.first()?.payment_method.as_ref()
    }
}

// =============================================================================
// Shipping & Payment
// =============================================================================

/// Delivery time window of a shipping method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryTime {
    pub name: Option<String>,
    pub min: u32,
    pub max: u32,
    pub unit: Option<String>,
}

/// A shipping method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub delivery_time: Option<DeliveryTime>,
    pub media: Option<Media>,
}

/// A payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub after_order_enabled: bool,
    pub short_name: Option<String>,
    pub technical_name: Option<String>,
    pub media: Option<Media>,
}

// =============================================================================
// Countries & Salutations
// =============================================================================

/// A country state / region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CountryState {
    pub id: CountryStateId,
    pub country_id: Option<CountryId>,
    pub short_code: Option<String>,
    pub name: String,
    pub position: i32,
    pub active: bool,
}

/// A country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    pub iso: Option<String>,
    pub iso3: Option<String>,
    pub position: i32,
    pub active: bool,
    pub shipping_available: bool,
    pub states: Option<Vec<CountryState>>,
}

/// A salutation ("Herr", "Frau", "Keine Angabe").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Salutation {
    pub id: SalutationId,
    pub salutation_key: String,
    pub display_name: Option<String>,
    pub letter_name: Option<String>,
}

impl Salutation {
    /// Whether this is the neutral "not specified" salutation.
    #[must_use]
    pub fn is_not_specified(&self) -> bool {
        self.salutation_key == "not_specified"
            || self
                .display_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains("keine"))
    }
}

// =============================================================================
// Customer & Addresses
// =============================================================================

/// A stored customer address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    pub id: Option<AddressId>,
    pub country_id: Option<CountryId>,
    pub country_state_id: Option<CountryStateId>,
    pub salutation_id: Option<SalutationId>,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub zipcode: String,
    pub city: String,
    pub company: Option<String>,
    pub phone_number: Option<String>,
    pub additional_address_line1: Option<String>,
    pub additional_address_line2: Option<String>,
    pub country: Option<Country>,
    pub country_state: Option<CountryState>,
}

/// Address payload for registration and address updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub country_id: CountryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_state_id: Option<CountryStateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salutation_id: Option<SalutationId>,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub zipcode: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// A customer record (durable account or guest checkout identity).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub guest: bool,
    pub first_name: String,
    pub last_name: String,
    pub salutation_id: Option<SalutationId>,
    pub salutation: Option<Salutation>,
    pub default_billing_address_id: Option<AddressId>,
    pub default_billing_address: Option<Address>,
    pub default_shipping_address_id: Option<AddressId>,
    pub default_shipping_address: Option<Address>,
    pub active_billing_address: Option<Address>,
    pub active_shipping_address: Option<Address>,
    pub addresses: Vec<Address>,
}

impl Customer {
    /// Identity classification from the `guest` flag.
    #[must_use]
    pub const fn status(&self) -> AuthStatus {
        AuthStatus::from_guest_flag(self.guest)
    }

    /// "First Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Default billing address, else the active one.
    #[must_use]
    pub fn billing_address(&self) -> Option<&Address> {
        self.default_billing_address
            .as_ref()
            .or(self.active_billing_address.as_ref())
    }

    /// Default shipping address, else the active one.
    #[must_use]
    pub fn shipping_address(&self) -> Option<&Address> {
        self.default_shipping_address
            .as_ref()
            .or(self.active_shipping_address.as_ref())
    }
}

// =============================================================================
// Context
// =============================================================================

/// Currency of the sales channel context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Currency {
    pub id: Option<String>,
    pub iso_code: String,
    pub symbol: Option<String>,
    pub short_name: Option<String>,
    pub factor: Decimal,
}

/// The sales channel context bound to a context token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SalesChannelContext {
    pub token: Option<String>,
    pub customer: Option<Customer>,
    pub currency: Option<Currency>,
    pub payment_method: Option<PaymentMethod>,
    pub shipping_method: Option<ShippingMethod>,
}

// =============================================================================
// Orders
// =============================================================================

/// State machine state of an order, delivery or transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateMachineState {
    pub name: String,
    pub technical_name: String,
}

/// Customer snapshot stored on an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub customer_id: Option<CustomerId>,
}

/// An order position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: String,
    pub product_id: Option<ProductId>,
    pub referenced_id: Option<String>,
    pub label: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub cover: Option<Media>,
}

/// An order delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderDelivery {
    pub id: String,
    pub shipping_costs: Option<CalculatedPrice>,
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_order_address: Option<Address>,
    pub tracking_codes: Vec<String>,
    pub state_machine_state: Option<StateMachineState>,
}

/// An order payment transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderTransaction {
    pub id: String,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Option<CalculatedPrice>,
    pub state_machine_state: Option<StateMachineState>,
}

/// A placed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    /// ISO-8601 timestamp as reported by the backend.
    pub order_date_time: Option<String>,
    pub amount_total: Decimal,
    pub amount_net: Decimal,
    pub shipping_total: Decimal,
    pub currency: Option<Currency>,
    pub order_customer: Option<OrderCustomer>,
    pub line_items: Vec<OrderLineItem>,
    pub deliveries: Vec<OrderDelivery>,
    pub transactions: Vec<OrderTransaction>,
    pub state_machine_state: Option<StateMachineState>,
    pub billing_address: Option<Address>,
}

// =============================================================================
// Envelopes
// =============================================================================

/// Search result envelope (`{ elements, total, ... }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub elements: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            total: 0,
            page: None,
            limit: None,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// `POST account/login` body.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `POST account/register` body for both guest and durable accounts.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub guest: bool,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salutation_id: Option<SalutationId>,
    pub first_name: String,
    pub last_name: String,
    pub storefront_url: String,
    pub accepted_data_protection: bool,
    pub billing_address: AddressInput,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("guest", &self.guest)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("salutation_id", &self.salutation_id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("storefront_url", &self.storefront_url)
            .field("billing_address", &self.billing_address)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// Product as embedded in wishlist responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WishlistProduct {
    pub id: ProductId,
    pub name: Option<String>,
    pub cover: Option<ProductMedia>,
    pub calculated_price: Option<CalculatedPrice>,
}

/// Wishlist entry wrapping a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: Option<String>,
    pub product_id: Option<ProductId>,
    pub product: Option<WishlistProduct>,
}

/// `{ products: { elements: [...] } }` inside the `wishlist` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WishlistEnvelope {
    pub products: Option<ListResponse<WishlistEntry>>,
}

/// `POST customer/wishlist` response.
///
/// Depending on the backend version the products arrive either as
/// `wishlist.products.elements[].product` or as top-level
/// `products.elements[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WishlistResponse {
    pub wishlist: Option<WishlistEnvelope>,
    pub products: Option<ListResponse<WishlistProduct>>,
}

impl WishlistResponse {
    /// All products in response order, regardless of shape.
    #[must_use]
    pub fn into_products(self) -> Vec<WishlistProduct> {
        let nested = self
            .wishlist
            .and_then(|w| w.products)
            .map(|list| list.elements)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.product);
        let flat = self
            .products
            .map(|list| list.elements)
            .unwrap_or_default();
        nested.chain(flat).collect()
    }
}

/// `POST customer/wishlist/merge` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistMergeRequest {
    pub product_ids: Vec<ProductId>,
}
