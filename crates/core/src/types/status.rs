//! Identity status of the current session.

use serde::{Deserialize, Serialize};

/// Who the current session belongs to.
///
/// A guest identity is created during checkout so an order can be placed
/// without an account. It is never treated as a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No customer is attached to the session.
    #[default]
    Unauthenticated,
    /// A transient checkout identity (`guest: true` on the backend).
    Guest,
    /// A durable customer account.
    Customer,
}

impl AuthStatus {
    /// Classify a customer record by its `guest` flag.
    #[must_use]
    pub const fn from_guest_flag(guest: bool) -> Self {
        if guest { Self::Guest } else { Self::Customer }
    }

    /// Whether this status counts as "logged in".
    #[must_use]
    pub const fn is_logged_in(self) -> bool {
        matches!(self, Self::Customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_durable_customers_are_logged_in() {
        assert!(!AuthStatus::Unauthenticated.is_logged_in());
        assert!(!AuthStatus::from_guest_flag(true).is_logged_in());
        assert!(AuthStatus::from_guest_flag(false).is_logged_in());
    }

    #[test]
    fn test_default_is_unauthenticated() {
        assert_eq!(AuthStatus::default(), AuthStatus::Unauthenticated);
    }
}
