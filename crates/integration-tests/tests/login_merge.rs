//! Login, logout and re-login through the relay with wishlist merging.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use furniture_core::ProductId;
use furniture_integration_tests::{ACCESS_KEY, TestRelay};
use furniture_storefront::client::wishlist::storage_key;
use furniture_storefront::client::{LikedProduct, ProductSnapshot, Storefront, WishlistMode};
use furniture_storefront::storage::{KeyValueStoreExt, MemoryStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const CUSTOMER_TOKEN: &str = "tok-customer-1";

fn customer_body() -> serde_json::Value {
    json!({
        "id": "c1",
        "email": "ada@example.com",
        "guest": false,
        "firstName": "Ada",
        "lastName": "Lovelace"
    })
}

fn snapshot(key: &str, name: &str) -> ProductSnapshot {
    ProductSnapshot {
        name: Some(name.to_string()),
        ..ProductSnapshot::new(key)
    }
}

fn keys(likes: &[LikedProduct]) -> Vec<&str> {
    likes.iter().map(|item| item.key.as_str()).collect()
}

/// Cart, login, customer and logout endpoints shared by the scenarios.
async fn mount_session_backend(relay: &TestRelay) {
    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lineItems": []})))
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/login"))
        .and(header("sw-access-key", ACCESS_KEY))
        .and(body_json(json!({"email": "ada@example.com", "password": "hunter22"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", CUSTOMER_TOKEN)
                .set_body_json(json!({"contextToken": CUSTOMER_TOKEN})),
        )
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/customer"))
        .and(header("sw-context-token", CUSTOMER_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(customer_body()))
        .with_priority(1)
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/customer"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"code": "CHECKOUT__CUSTOMER_NOT_LOGGED_IN"}]
        })))
        .with_priority(10)
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/logout"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", "tok-anon-2")
                .set_body_json(json!({"contextToken": "tok-anon-2"})),
        )
        .mount(&relay.backend)
        .await;
}

#[tokio::test]
async fn test_guest_likes_survive_login_logout_cycle() {
    let relay = TestRelay::start().await;
    mount_session_backend(&relay).await;

    let storage = Arc::new(MemoryStore::new());
    let storefront = Storefront::with_storage(&relay.client_config(), storage.clone());
    storefront.start().await;
    assert!(!storefront.auth().is_logged_in());

    // First guest period
    storefront.wishlist().add(snapshot("p1", "Oak chair")).await;
    assert_eq!(storefront.wishlist().like_count(), 1);

    let customer = storefront
        .auth()
        .login("ada@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(customer.id.as_str(), "c1");
    assert!(storefront.auth().is_logged_in());
    assert_eq!(
        storefront.gateway().context_token().unwrap().as_str(),
        CUSTOMER_TOKEN
    );
    assert_eq!(keys(&storefront.wishlist().liked_products()), ["p1"]);

    let stored: Vec<LikedProduct> = storage.get_json(&storage_key("c1")).unwrap().unwrap();
    assert_eq!(keys(&stored), ["p1"]);
    assert!(
        storage
            .get_json::<Vec<LikedProduct>>(&storage_key("guest"))
            .unwrap()
            .is_none()
    );

    storefront.auth().logout().await.unwrap();
    assert!(!storefront.auth().is_logged_in());
    assert_eq!(storefront.wishlist().like_count(), 0);
    assert_eq!(
        storefront.gateway().context_token().unwrap().as_str(),
        "tok-anon-2"
    );

    // Second guest period
    storefront.wishlist().add(snapshot("p2", "Walnut table")).await;
    assert!(!storefront.wishlist().is_liked(&ProductId::from("p1")));

    storefront
        .auth()
        .login("ada@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(keys(&storefront.wishlist().liked_products()), ["p1", "p2"]);

    let stored: Vec<LikedProduct> = storage.get_json(&storage_key("c1")).unwrap().unwrap();
    assert_eq!(keys(&stored), ["p1", "p2"]);
}

#[tokio::test]
async fn test_login_merges_guest_likes_into_remote_wishlist() {
    let relay = TestRelay::start().await;
    mount_session_backend(&relay).await;

    Mock::given(method("POST"))
        .and(path("/store-api/customer/wishlist/merge"))
        .and(header("sw-context-token", CUSTOMER_TOKEN))
        .and(body_json(json!({"productIds": ["p1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/customer/wishlist"))
        .and(header("sw-context-token", CUSTOMER_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": {"total": 2, "elements": [
                {"id": "p9", "name": "Linen sofa", "calculatedPrice": {"unitPrice": 899.0, "quantity": 1, "totalPrice": 899.0}},
                {"id": "p1"}
            ]}
        })))
        .mount(&relay.backend)
        .await;

    let mut config = relay.client_config();
    config.wishlist_mode = WishlistMode::Remote;
    let storefront = Storefront::with_storage(&config, Arc::new(MemoryStore::new()));
    storefront.start().await;

    storefront.wishlist().add(snapshot("p1", "Oak chair")).await;
    storefront
        .auth()
        .login("ada@example.com", "hunter22")
        .await
        .unwrap();

    let likes = storefront.wishlist().liked_products();
    assert_eq!(keys(&likes), ["p9", "p1"]);
    // The guest copy fills the name the backend left out
    assert_eq!(likes[1].name.as_deref(), Some("Oak chair"));
    assert_eq!(likes[0].name.as_deref(), Some("Linen sofa"));
    assert!(!storefront.wishlist().is_syncing());
}

#[tokio::test]
async fn test_wrong_password_keeps_guest_session() {
    let relay = TestRelay::start().await;

    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lineItems": []})))
        .mount(&relay.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/store-api/account/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{
                "status": "401",
                "code": "CHECKOUT__CUSTOMER_AUTH_BAD_CREDENTIALS",
                "title": "Unauthorized",
                "detail": "Invalid username and/or password."
            }]
        })))
        .mount(&relay.backend)
        .await;

    let storefront = Storefront::with_storage(&relay.client_config(), Arc::new(MemoryStore::new()));
    storefront.start().await;
    storefront.wishlist().add(snapshot("p1", "Oak chair")).await;

    let err = storefront
        .auth()
        .login("ada@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Invalid username and/or password.");
    assert_eq!(
        storefront.auth().error().as_deref(),
        Some("Invalid username and/or password.")
    );
    assert!(!storefront.auth().is_logged_in());
    assert!(storefront.wishlist().is_liked(&ProductId::from("p1")));
}
