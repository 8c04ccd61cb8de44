//! Integration tests for Xetivo Share.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p xetivo-share-integration-tests
//! ```
//!
//! Every test starts a fake record store and the real share router on
//! ephemeral ports, so no external services or credentials are needed.
//!
//! # Fake record store catalog
//!
//! | `product_id` | Response                                          |
//! |--------------|---------------------------------------------------|
//! | `abc123`     | "Test Widget" with one allow-listed image         |
//! | `noimg`      | "Plain Thing" with no images                      |
//! | `offsite`    | "Offsite Thing" with an image outside the allow-list |
//! | `boom`       | 500 `internal error`                              |
//! | `garbled`    | 200 with a body that is not JSON                  |
//! | anything else| 200 `[]`                                          |

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;
use xetivo_share::config::{RecordStoreConfig, ShareConfig};
use xetivo_share::images::{ImageAllowList, RemotePattern};
use xetivo_share::page::PageOptions;
use xetivo_share::state::AppState;
use xetivo_share_core::RedirectTiming;

/// Access key the fake record store expects.
pub const TEST_ANON_KEY: &str = "test-anon-key";

/// Public origin the share app renders into absolute URLs.
pub const TEST_PUBLIC_BASE_URL: &str = "https://share.test";

/// Image host on the test allow-list.
pub const TEST_IMAGE_URL: &str = "https://cdn.example.com/w.png";

/// A lookup as seen by the fake record store.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub path: String,
    pub product_id: Option<String>,
    pub select: Option<String>,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
    pub cache_control: Option<String>,
}

/// In-process stand-in for the record store REST API.
#[derive(Clone)]
pub struct FakeRecordStore {
    pub base_url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeRecordStore {
    /// Start the fake store on an ephemeral port.
    pub async fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));

        let router = Router::new()
            .route("/rest/v1/products", get(products))
            .with_state(Arc::clone(&requests));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake record store");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake record store failed");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).expect("Invalid fake store URL"),
            requests,
        }
    }

    /// Lookups received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("Request log poisoned")
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("Request log poisoned").len()
    }
}

async fn products(
    State(requests): State<Arc<Mutex<Vec<RecordedRequest>>>>,
    Query(query): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let product_id = query.get("product_id").cloned();
    requests
        .lock()
        .expect("Request log poisoned")
        .push(RecordedRequest {
            path: "/rest/v1/products".to_string(),
            product_id: product_id.clone(),
            select: query.get("select").cloned(),
            apikey: header("apikey"),
            authorization: header("authorization"),
            cache_control: header("cache-control"),
        });

    if header("apikey").as_deref() != Some(TEST_ANON_KEY) {
        return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
    }

    match product_id.as_deref() {
        Some("eq.abc123") => Json(json!([{
            "product_name": "Test Widget",
            "image_uri": [TEST_IMAGE_URL],
            "description": "A very good widget.",
        }]))
        .into_response(),
        Some("eq.noimg") => Json(json!([{
            "product_name": "Plain Thing",
            "image_uri": [],
        }]))
        .into_response(),
        Some("eq.offsite") => Json(json!([{
            "product_name": "Offsite Thing",
            "image_uri": ["https://evil.example.net/x.png"],
        }]))
        .into_response(),
        Some("eq.boom") => (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response(),
        Some("eq.garbled") => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        _ => Json(json!([])).into_response(),
    }
}

/// Share configuration pointed at a fake record store.
pub fn test_config(store: &FakeRecordStore) -> ShareConfig {
    ShareConfig {
        host: "127.0.0.1".parse().expect("Invalid host"),
        port: 0,
        public_base_url: TEST_PUBLIC_BASE_URL.to_string(),
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../share/static")),
        site_name: "Xetivo".to_string(),
        app_scheme: "xetivo".to_string(),
        redirect_timing: RedirectTiming::default(),
        page: PageOptions::default(),
        record_store: RecordStoreConfig {
            base_url: Some(store.base_url.clone()),
            anon_key: Some(SecretString::from(TEST_ANON_KEY)),
        },
        images: ImageAllowList::new(vec![
            RemotePattern::parse("https://cdn.example.com/**").expect("Invalid pattern"),
        ]),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A running share server and the fake record store behind it.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: FakeRecordStore,
}

impl TestApp {
    /// Start the share server with the default test configuration.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Start the share server after adjusting the test configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut ShareConfig)) -> Self {
        let store = FakeRecordStore::start().await;
        let mut config = test_config(&store);
        configure(&mut config);

        let app = xetivo_share::app(AppState::new(config));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind share server");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Share server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            store,
        }
    }

    /// GET a path on the share server.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("Request to share server failed")
    }
}
