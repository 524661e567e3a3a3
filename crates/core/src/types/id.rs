//! Newtype IDs for type-safe entity references.
//!
//! The commerce backend identifies every entity with an opaque string (a
//! 32-character hex UUID in practice). Use the `define_id!` macro to create
//! wrappers that prevent accidentally passing a customer id where a product
//! id is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Default` (empty), `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Accessors: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>`, `AsRef<str>` and `Display`
///
/// # Example
///
/// ```rust
/// # use furniture_core::define_id;
/// define_id!(ProductId);
/// define_id!(CustomerId);
///
/// let product = ProductId::new("0190a1b2c3");
/// let customer = CustomerId::new("0190a1b2c3");
/// assert_eq!(product.as_str(), customer.as_str());
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = customer;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(LineItemId);
define_id!(CustomerId);
define_id!(AddressId);
define_id!(ShippingMethodId);
define_id!(PaymentMethodId);
define_id!(CountryId);
define_id!(CountryStateId);
define_id!(SalutationId);
define_id!(OrderId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrips_as_plain_string() {
        let id = ProductId::new("018f3a9c0e7b7d1e8a4b5c6d7e8f9a0b");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"018f3a9c0e7b7d1e8a4b5c6d7e8f9a0b\"");

        let parsed: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_display_and_conversions() {
        let id = CustomerId::from("c-1");
        assert_eq!(id.to_string(), "c-1");
        assert_eq!(id.as_str(), "c-1");
        assert_eq!(String::from(id), "c-1");
    }

    #[test]
    fn test_ids_order_lexicographically() {
        let mut ids = vec![LineItemId::new("b"), LineItemId::new("a")];
        ids.sort();
        assert_eq!(ids, vec![LineItemId::new("a"), LineItemId::new("b")]);
    }
}
