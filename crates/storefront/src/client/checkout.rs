//! Checkout form, validation and order submission.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use furniture_core::{CountryId, CountryStateId, Email, SalutationId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::StorefrontError;
use crate::client::auth::AuthManager;
use crate::client::cart::CartManager;
use crate::shopware::{AddressInput, Customer, Order};

/// Order subtotal from which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

// =============================================================================
// Form
// =============================================================================

/// Form fields that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutField {
    Email,
    FirstName,
    LastName,
    Street,
    Zipcode,
    City,
    CountryId,
}

impl CheckoutField {
    /// Required fields in display order.
    pub const REQUIRED: [Self; 6] = [
        Self::FirstName,
        Self::LastName,
        Self::Street,
        Self::Zipcode,
        Self::City,
        Self::CountryId,
    ];

    /// Label shown next to the field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Street => "Street",
            Self::Zipcode => "Zip code",
            Self::City => "City",
            Self::CountryId => "Country",
        }
    }
}

/// Per-field validation messages.
pub type FieldErrors = BTreeMap<CheckoutField, String>;

/// Checkout contact and billing data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutForm {
    pub email: String,
    pub salutation_id: Option<SalutationId>,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub zipcode: String,
    pub city: String,
    pub country_id: Option<CountryId>,
    pub country_state_id: Option<CountryStateId>,
    pub phone_number: Option<String>,
}

impl CheckoutForm {
    /// Validation message for one field, if it is invalid.
    #[must_use]
    pub fn validate_field(&self, field: CheckoutField) -> Option<String> {
        let value = match field {
            CheckoutField::Email => {
                let email = self.email.trim();
                if email.is_empty() {
                    return Some("Email is required".to_string());
                }
                return Email::parse(email)
                    .err()
                    .map(|_| "Invalid email address".to_string());
            }
            CheckoutField::FirstName => self.first_name.as_str(),
            CheckoutField::LastName => self.last_name.as_str(),
            CheckoutField::Street => self.street.as_str(),
            CheckoutField::Zipcode => self.zipcode.as_str(),
            CheckoutField::City => self.city.as_str(),
            CheckoutField::CountryId => self.country_id.as_ref().map_or("", |id| id.as_str()),
        };

        value
            .trim()
            .is_empty()
            .then(|| format!("{} is required", field.label()))
    }

    /// All validation messages; empty when the form is valid.
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        std::iter::once(CheckoutField::Email)
            .chain(CheckoutField::REQUIRED)
            .filter_map(|field| self.validate_field(field).map(|msg| (field, msg)))
            .collect()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Whether all address fields are filled (email is not checked).
    #[must_use]
    pub fn is_address_complete(&self) -> bool {
        CheckoutField::REQUIRED
            .iter()
            .all(|field| self.validate_field(*field).is_none())
    }

    /// Fill the form from a logged-in customer and their billing address.
    pub fn prefill_from(&mut self, customer: &Customer) {
        self.email.clone_from(&customer.email);
        self.first_name.clone_from(&customer.first_name);
        self.last_name.clone_from(&customer.last_name);
        if customer.salutation_id.is_some() {
            self.salutation_id.clone_from(&customer.salutation_id);
        }

        if let Some(address) = customer.billing_address() {
            self.street.clone_from(&address.street);
            self.zipcode.clone_from(&address.zipcode);
            self.city.clone_from(&address.city);
            self.country_id.clone_from(&address.country_id);
            self.country_state_id.clone_from(&address.country_state_id);
            self.phone_number.clone_from(&address.phone_number);
        }
    }

    /// Billing address payload for registration or address updates.
    #[must_use]
    pub fn to_address_input(&self, salutation_id: Option<SalutationId>) -> AddressInput {
        AddressInput {
            country_id: self.country_id.clone().unwrap_or_default(),
            country_state_id: self.country_state_id.clone(),
            salutation_id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            street: self.street.trim().to_string(),
            zipcode: self.zipcode.trim().to_string(),
            city: self.city.trim().to_string(),
            phone_number: self
                .phone_number
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

/// Durable account registration input.
#[derive(Clone, Default)]
pub struct RegistrationForm {
    pub profile: CheckoutForm,
    pub password: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("profile", &self.profile)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Number of completed checkout steps (address, shipping, payment).
///
/// A guest's address step needs the whole form, email included.
#[must_use]
pub fn completed_steps(
    logged_in: bool,
    form: &CheckoutForm,
    shipping_selected: bool,
    payment_selected: bool,
) -> u8 {
    // Each step only counts once the previous one is done.
    if !(logged_in || form.is_valid()) {
        return 0;
    }
    if !shipping_selected {
        return 1;
    }
    if !payment_selected {
        return 2;
    }
    3
}

/// Whether the order can be submitted.
#[must_use]
pub fn is_checkout_complete(
    logged_in: bool,
    form: &CheckoutForm,
    shipping_selected: bool,
    payment_selected: bool,
) -> bool {
    (logged_in || form.is_valid()) && shipping_selected && payment_selected
}

/// Amount missing until shipping is free (zero once reached).
#[must_use]
pub fn amount_to_free_shipping(subtotal: Decimal) -> Decimal {
    (FREE_SHIPPING_THRESHOLD - subtotal).max(Decimal::ZERO)
}

/// Progress towards free shipping in percent, capped at 100.
#[must_use]
pub fn free_shipping_progress(subtotal: Decimal) -> Decimal {
    let percent = subtotal.max(Decimal::ZERO) * Decimal::ONE_HUNDRED / FREE_SHIPPING_THRESHOLD;
    percent.min(Decimal::ONE_HUNDRED)
}

// =============================================================================
// Submission
// =============================================================================

/// Where an order submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    #[default]
    Idle,
    Registering,
    Placing,
}

#[derive(Debug, Default)]
struct CheckoutState {
    step: OrderStep,
    global_error: Option<String>,
    guest_registered: bool,
}

/// Orchestrates guest registration and order placement.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    cart: CartManager,
    auth: AuthManager,
    state: RwLock<CheckoutState>,
}

impl Checkout {
    #[must_use]
    pub fn new(cart: CartManager, auth: AuthManager) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                cart,
                auth,
                state: RwLock::new(CheckoutState::default()),
            }),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut CheckoutState) -> R) -> R {
        f(&mut self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn step(&self) -> OrderStep {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .step
    }

    /// Message of the last failed submission, cleared on the next attempt.
    #[must_use]
    pub fn global_error(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .global_error
            .clone()
    }

    /// Completed steps for the current session.
    #[must_use]
    pub fn completed_steps(&self, form: &CheckoutForm) -> u8 {
        let cart = &self.inner.cart;
        completed_steps(
            self.inner.auth.is_logged_in(),
            form,
            cart.selected_shipping_method_id().is_some(),
            cart.selected_payment_method_id().is_some(),
        )
    }

    /// Whether `form` plus the current selections can be submitted.
    #[must_use]
    pub fn is_complete(&self, form: &CheckoutForm) -> bool {
        let cart = &self.inner.cart;
        is_checkout_complete(
            self.inner.auth.is_logged_in(),
            form,
            cart.selected_shipping_method_id().is_some(),
            cart.selected_payment_method_id().is_some(),
        )
    }

    /// Place the order for the current session.
    ///
    /// Logged-in customers order directly. Guests are validated and
    /// registered as a guest identity first. A guest registered by an earlier
    /// failed attempt is reused while the session context still carries it.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidForm`] for an invalid guest form, or
    /// the registration or placement failure.
    #[instrument(skip(self, form))]
    pub async fn submit(&self, form: &CheckoutForm) -> Result<Order, StorefrontError> {
        self.update(|s| s.global_error = None);

        let result = self.run(form).await;

        self.update(|s| {
            s.step = OrderStep::Idle;
            match &result {
                Ok(_) => s.guest_registered = false,
                Err(e) => s.global_error = Some(e.to_string()),
            }
        });

        match &result {
            Ok(order) => info!(order_number = %order.order_number, "Checkout completed"),
            Err(e) => warn!(error = %e, "Checkout failed"),
        }
        result
    }

    async fn run(&self, form: &CheckoutForm) -> Result<Order, StorefrontError> {
        if !self.inner.auth.is_logged_in() {
            let errors = form.validate();
            if !errors.is_empty() {
                return Err(StorefrontError::InvalidForm(errors));
            }

            let registered = self.update(|s| s.guest_registered);
            if !registered || !self.session_has_customer().await {
                self.update(|s| s.step = OrderStep::Registering);
                self.inner.cart.register_guest(form).await?;
                self.update(|s| s.guest_registered = true);
            }
        }

        self.update(|s| s.step = OrderStep::Placing);
        self.inner.cart.place_order().await
    }

    /// Whether the session context still carries the registered guest.
    async fn session_has_customer(&self) -> bool {
        match self.inner.cart.fetch_context().await {
            Ok(context) => context.customer.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not check session customer, registering again");
                false
            }
        }
    }

    /// Forget the registered guest, the step and the held error.
    pub fn reset(&self) {
        self.update(|s| *s = CheckoutState::default());
    }
}
