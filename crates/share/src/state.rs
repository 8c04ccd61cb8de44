//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ShareConfig;
use crate::records::RecordStoreClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; everything inside is read-only.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ShareConfig,
    records: RecordStoreClient,
    csp_img_sources: String,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ShareConfig) -> Self {
        let records = RecordStoreClient::new(&config.record_store);
        let csp_img_sources = config.images.csp_sources().join(" ");

        Self {
            inner: Arc::new(AppStateInner {
                config,
                records,
                csp_img_sources,
            }),
        }
    }

    /// Get a reference to the share configuration.
    #[must_use]
    pub fn config(&self) -> &ShareConfig {
        &self.inner.config
    }

    /// Get a reference to the record store client.
    #[must_use]
    pub fn records(&self) -> &RecordStoreClient {
        &self.inner.records
    }

    /// Allow-listed image sources for the `img-src` CSP directive.
    #[must_use]
    pub fn csp_img_sources(&self) -> &str {
        &self.inner.csp_img_sources
    }
}
