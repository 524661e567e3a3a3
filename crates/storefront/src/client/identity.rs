//! Logged-in customer slot shared by auth and wishlist.

use std::sync::{PoisonError, RwLock};

use furniture_core::{AuthStatus, CustomerId};

use crate::shopware::Customer;

/// The customer the session is logged in as.
///
/// Guest records are never stored here; they live only in the cart's
/// session marker.
#[derive(Debug, Default)]
pub struct Identity {
    customer: RwLock<Option<Customer>>,
}

impl Identity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the logged-in customer.
    pub fn customer(&self) -> Option<Customer> {
        self.customer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the customer; guest records clear the slot instead.
    pub fn set(&self, customer: Option<Customer>) {
        let customer = customer.filter(|c| !c.guest);
        *self.customer.write().unwrap_or_else(PoisonError::into_inner) = customer;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn status(&self) -> AuthStatus {
        self.customer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(AuthStatus::Unauthenticated, Customer::status)
    }

    pub fn is_logged_in(&self) -> bool {
        self.status().is_logged_in()
    }

    /// Id of the logged-in customer.
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: &str, guest: bool) -> Customer {
        Customer {
            id: CustomerId::new(id),
            email: "jane@example.com".to_string(),
            guest,
            ..Customer::default()
        }
    }

    #[test]
    fn test_guest_is_not_stored() {
        let identity = Identity::new();
        identity.set(Some(customer("g1", true)));
        assert!(identity.customer().is_none());
        assert_eq!(identity.status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn test_customer_round_trip() {
        let identity = Identity::new();
        identity.set(Some(customer("c1", false)));
        assert!(identity.is_logged_in());
        assert_eq!(identity.customer_id(), Some(CustomerId::new("c1")));

        identity.clear();
        assert!(!identity.is_logged_in());
        assert!(identity.customer_id().is_none());
    }
}
