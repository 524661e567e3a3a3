//! End-to-end tests for the furniture storefront.
//!
//! Each test starts a mocked Store-API backend, serves the real relay router
//! in front of it on an ephemeral port and drives a client
//! [`Storefront`](furniture_storefront::client::Storefront) through the
//! relay. Nothing outside the test process is contacted.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p furniture-integration-tests
//! ```

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;

use furniture_storefront::config::{ClientConfig, ShopwareConfig, StorefrontConfig};
use furniture_storefront::routes;
use furniture_storefront::state::AppState;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use wiremock::MockServer;

/// Access key the relay attaches to every backend request.
pub const ACCESS_KEY: &str = "SWSCINTEGRATIONKEY7Q4Z";

/// Sales channel domain used for registrations.
pub const STOREFRONT_URL: &str = "https://shop.example.com";

/// Mocked backend plus a running relay in front of it.
pub struct TestRelay {
    /// The mocked Store-API; backend paths start with `/store-api/`.
    pub backend: MockServer,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl TestRelay {
    /// Start the backend mock and serve the relay on `127.0.0.1:0`.
    pub async fn start() -> Self {
        let backend = MockServer::start().await;

        let config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            shopware: ShopwareConfig {
                api_url: Url::parse(&format!("{}/store-api", backend.uri()))
                    .expect("valid backend url"),
                access_key: SecretString::from(ACCESS_KEY),
                storefront_url: Some(STOREFRONT_URL.to_string()),
            },
            frame_ancestors: "'none'".to_string(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let state = AppState::new(config).expect("Failed to build relay state");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind relay listener");
        let addr = listener.local_addr().expect("listener has an address");
        let server = tokio::spawn(async move {
            axum::serve(listener, routes::app(state))
                .await
                .expect("Relay server error");
        });

        Self {
            backend,
            addr,
            server,
        }
    }

    /// Relay endpoint as seen by the client, e.g. `http://127.0.0.1:PORT/api/shopware`.
    #[must_use]
    pub fn relay_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/shopware", self.addr)).expect("valid relay url")
    }

    /// Client configuration pointing at this relay.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.relay_url());
        config.storefront_url = Some(STOREFRONT_URL.to_string());
        config
    }

    /// Values of the `sw-context-token` header the backend received on `path`,
    /// in arrival order. Requests without the header yield `None`.
    pub async fn tokens_sent_to(&self, path: &str) -> Vec<Option<String>> {
        self.backend
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .map(|request| {
                request
                    .headers
                    .get("sw-context-token")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            })
            .collect()
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.server.abort();
    }
}
