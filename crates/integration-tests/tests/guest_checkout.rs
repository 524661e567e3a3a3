//! Guest checkout end to end: cart, validation, guest registration, order.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use furniture_core::{CountryId, LineItemId, ProductId, SalutationId};
use furniture_integration_tests::{STOREFRONT_URL, TestRelay};
use furniture_storefront::client::{
    CheckoutField, CheckoutForm, OrderStep, Storefront, StorefrontError,
};
use furniture_storefront::storage::MemoryStore;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const CART_TOKEN: &str = "tok-guest-cart";
const GUEST_TOKEN: &str = "tok-guest-customer";

fn cart_body() -> Value {
    json!({
        "token": CART_TOKEN,
        "price": {"netPrice": 168.07, "totalPrice": 204.9, "positionPrice": 200.0},
        "lineItems": [{
            "id": "p1",
            "referencedId": "p1",
            "label": "Oak chair",
            "quantity": 2,
            "type": "product",
            "price": {"unitPrice": 100.0, "quantity": 2, "totalPrice": 200.0}
        }],
        "deliveries": [{
            "shippingMethod": {"id": "ship-std", "name": "Standard"},
            "shippingCosts": {"unitPrice": 4.9, "quantity": 1, "totalPrice": 4.9}
        }],
        "transactions": [{"paymentMethod": {"id": "pay-invoice", "name": "Invoice"}}]
    })
}

fn valid_form() -> CheckoutForm {
    CheckoutForm {
        email: "grace@example.com".to_string(),
        salutation_id: Some(SalutationId::from("sal-none")),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        street: "Main Street 1".to_string(),
        zipcode: "10115".to_string(),
        city: "Berlin".to_string(),
        country_id: Some(CountryId::from("country-de")),
        ..CheckoutForm::default()
    }
}

async fn mount_checkout_backend(relay: &TestRelay) {
    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/checkout/cart/line-item"))
        .and(body_partial_json(json!({"items": [{"id": "p1", "quantity": 2}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", CART_TOKEN)
                .set_body_json(cart_body()),
        )
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/register"))
        .and(header("sw-context-token", CART_TOKEN))
        .and(body_partial_json(json!({
            "guest": true,
            "email": "grace@example.com",
            "salutationId": "sal-none",
            "storefrontUrl": STOREFRONT_URL,
            "acceptedDataProtection": true,
            "billingAddress": {"countryId": "country-de", "city": "Berlin"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", GUEST_TOKEN)
                .set_body_json(json!({
                    "id": "g1",
                    "email": "grace@example.com",
                    "guest": true,
                    "firstName": "Grace",
                    "lastName": "Hopper"
                })),
        )
        .expect(1)
        .mount(&relay.backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/store-api/context"))
        .and(header("sw-context-token", GUEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": GUEST_TOKEN,
            "customer": {"id": "g1", "email": "grace@example.com", "guest": true}
        })))
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/checkout/order"))
        .and(header("sw-context-token", GUEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "o1",
            "orderNumber": "10001",
            "amountTotal": 204.9,
            "orderCustomer": {"email": "grace@example.com", "firstName": "Grace", "lastName": "Hopper"}
        })))
        .expect(1)
        .mount(&relay.backend)
        .await;
}

#[tokio::test]
async fn test_guest_checkout_places_order() {
    let relay = TestRelay::start().await;
    mount_checkout_backend(&relay).await;

    let storefront = Storefront::with_storage(&relay.client_config(), Arc::new(MemoryStore::new()));
    storefront.start().await;

    storefront
        .cart()
        .add_item(&ProductId::from("p1"), 2)
        .await
        .unwrap();
    assert_eq!(storefront.cart().item_count(), 2);
    assert_eq!(
        storefront.cart().selected_shipping_method_id().unwrap().as_str(),
        "ship-std"
    );

    // An incomplete form never reaches the backend
    let err = storefront
        .checkout()
        .submit(&CheckoutForm::default())
        .await
        .unwrap_err();
    let StorefrontError::InvalidForm(errors) = &err else {
        panic!("expected form errors, got {err:?}");
    };
    assert_eq!(errors[&CheckoutField::Email], "Email is required");
    assert_eq!(errors[&CheckoutField::CountryId], "Country is required");
    assert!(storefront.checkout().global_error().is_some());

    let form = valid_form();
    assert!(storefront.checkout().is_complete(&form));

    let order = storefront.checkout().submit(&form).await.unwrap();
    assert_eq!(order.order_number, "10001");
    assert_eq!(storefront.checkout().step(), OrderStep::Idle);
    assert!(storefront.checkout().global_error().is_none());

    // The placed cart is gone; the next access loads a fresh one
    assert!(storefront.cart().cart().is_none());
    assert!(!storefront.cart().is_customer_registered());
    assert!(!storefront.auth().is_logged_in());
    assert_eq!(
        storefront.gateway().context_token().unwrap().as_str(),
        GUEST_TOKEN
    );
}

#[tokio::test]
async fn test_backend_errors_reach_the_client_through_the_relay() {
    let relay = TestRelay::start().await;

    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .mount(&relay.backend)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/store-api/checkout/cart/line-item"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("sw-context-token", "tok-after-error")
                .set_body_json(json!({
                    "errors": [
                        {"code": "CHECKOUT__CART_LINE_ITEM_NOT_FOUND", "detail": "Line item missing not found."},
                        {"code": "CHECKOUT__CART_INVALID"}
                    ]
                })),
        )
        .mount(&relay.backend)
        .await;

    let storefront = Storefront::with_storage(&relay.client_config(), Arc::new(MemoryStore::new()));
    storefront.start().await;

    let err = storefront
        .cart()
        .update_quantity(&LineItemId::from("missing"), 3)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    let message = "Line item missing not found., CHECKOUT__CART_INVALID";
    assert_eq!(err.to_string(), message);
    assert_eq!(storefront.cart().error().as_deref(), Some(message));
    // Error responses still rotate the session token
    assert_eq!(
        storefront.gateway().context_token().unwrap().as_str(),
        "tok-after-error"
    );
    // The held cart is untouched
    assert_eq!(storefront.cart().item_count(), 2);
}

#[tokio::test]
async fn test_order_without_customer_is_refused() {
    let relay = TestRelay::start().await;

    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .mount(&relay.backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/store-api/context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(&relay.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/store-api/checkout/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "o1"})))
        .expect(0)
        .mount(&relay.backend)
        .await;

    let storefront = Storefront::with_storage(&relay.client_config(), Arc::new(MemoryStore::new()));
    storefront.start().await;

    let err = storefront.cart().place_order().await.unwrap_err();
    assert!(matches!(err, StorefrontError::NoCustomer));
    assert_eq!(storefront.cart().item_count(), 2);
}
