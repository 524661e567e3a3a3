//! Session token capture, rotation and persistence across reloads.

#![allow(clippy::unwrap_used)]

use chrono::TimeDelta;
use furniture_core::ProductId;
use furniture_integration_tests::TestRelay;
use furniture_storefront::client::Storefront;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_backend(relay: &TestRelay) {
    Mock::given(method("GET"))
        .and(path("/store-api/checkout/cart"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", "tok-persist-1")
                .set_body_json(json!({"lineItems": []})),
        )
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/checkout/cart/line-item"))
        .and(header("sw-context-token", "tok-persist-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sw-context-token", "tok-persist-2")
                .set_body_json(json!({
                    "lineItems": [{"id": "p1", "referencedId": "p1", "quantity": 1, "type": "product"}]
                })),
        )
        .mount(&relay.backend)
        .await;

    Mock::given(method("POST"))
        .and(path("/store-api/account/customer"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"code": "CHECKOUT__CUSTOMER_NOT_LOGGED_IN"}]
        })))
        .mount(&relay.backend)
        .await;
}

#[tokio::test]
async fn test_token_survives_reload_and_follows_rotation() {
    let relay = TestRelay::start().await;
    mount_backend(&relay).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = relay.client_config();
    config.data_dir = Some(dir.path().to_path_buf());

    // First page load: no token yet, the backend hands one out
    let first = Storefront::new(&config).unwrap();
    assert!(first.gateway().context_token().is_none());
    first.start().await;
    assert_eq!(
        first.gateway().context_token().unwrap().as_str(),
        "tok-persist-1"
    );
    drop(first);

    // Reload: the stored token is sent from the very first request
    let second = Storefront::new(&config).unwrap();
    assert_eq!(
        second.gateway().context_token().unwrap().as_str(),
        "tok-persist-1"
    );
    second.start().await;
    second
        .cart()
        .add_item(&ProductId::from("p1"), 1)
        .await
        .unwrap();
    assert_eq!(
        second.gateway().context_token().unwrap().as_str(),
        "tok-persist-2"
    );

    let cart_tokens = relay.tokens_sent_to("/store-api/checkout/cart").await;
    assert_eq!(
        cart_tokens,
        [None, Some("tok-persist-1".to_string())],
        "first load starts without a token, the reload reuses the stored one"
    );

    // Another reload picks up the rotated token
    let third = Storefront::new(&config).unwrap();
    assert_eq!(
        third.gateway().context_token().unwrap().as_str(),
        "tok-persist-2"
    );
}

#[tokio::test]
async fn test_expired_token_is_not_reused() {
    let relay = TestRelay::start().await;
    mount_backend(&relay).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = relay.client_config();
    config.data_dir = Some(dir.path().to_path_buf());
    config.token_max_age = TimeDelta::zero();

    let first = Storefront::new(&config).unwrap();
    first.start().await;
    // The running session keeps its in-memory token
    assert_eq!(
        first.gateway().context_token().unwrap().as_str(),
        "tok-persist-1"
    );

    let reloaded = Storefront::new(&config).unwrap();
    assert!(reloaded.gateway().context_token().is_none());
}
