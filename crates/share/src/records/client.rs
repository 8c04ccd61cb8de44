//! HTTP client for the record store REST API.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, PRAGMA};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;
use xetivo_share_core::{ProductIdentifier, ProductRecord};

use super::{FetchError, Projection};
use crate::config::RecordStoreConfig;

/// REST root below the record store base URL.
const REST_PATH: &str = "/rest/v1";

/// Characters of an error body kept in [`FetchError::Transport`].
const ERROR_BODY_LIMIT: usize = 200;

/// Characters of a response body written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// Client for the record store's `products` table.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct RecordStoreClient {
    inner: Arc<RecordStoreClientInner>,
}

struct RecordStoreClientInner {
    client: reqwest::Client,
    products_endpoint: Option<Url>,
    anon_key: Option<SecretString>,
}

impl RecordStoreClient {
    /// Create a new record store client.
    ///
    /// Missing configuration is not an error here; lookups report it.
    #[must_use]
    pub fn new(config: &RecordStoreConfig) -> Self {
        Self {
            inner: Arc::new(RecordStoreClientInner {
                client: reqwest::Client::new(),
                products_endpoint: config.base_url.as_ref().map(products_endpoint),
                anon_key: config.anon_key.clone(),
            }),
        }
    }

    /// Whether lookups can be attempted at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.products_endpoint.is_some() && self.inner.anon_key.is_some()
    }

    /// Fetch a single product by identifier.
    ///
    /// Issues exactly one GET and never retries.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Configuration`] if the URL or key is missing (no request is made)
    /// - [`FetchError::NotFound`] if no row matches
    /// - [`FetchError::Transport`] for non-success statuses
    /// - [`FetchError::Http`] / [`FetchError::Parse`] / [`FetchError::InvalidRecord`]
    ///   for network failures and unusable responses
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn fetch_product(
        &self,
        id: &ProductIdentifier,
        projection: Projection,
    ) -> Result<ProductRecord, FetchError> {
        let endpoint = self
            .inner
            .products_endpoint
            .as_ref()
            .ok_or(FetchError::Configuration("RECORD_STORE_URL"))?;
        let anon_key = self
            .inner
            .anon_key
            .as_ref()
            .ok_or(FetchError::Configuration("RECORD_STORE_ANON_KEY"))?;

        let url = product_lookup_url(endpoint, id, projection);
        debug!(url = %url, "Fetching product");

        let response = self
            .inner
            .client
            .get(url)
            .header("apikey", anon_key.expose_secret())
            .header(
                AUTHORIZATION,
                format!("Bearer {}", anon_key.expose_secret()),
            )
            .header(ACCEPT, "application/json")
            // Product edits must show up on the next share
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text, LOG_BODY_LIMIT),
                "Record store returned non-success status"
            );
            return Err(FetchError::Transport {
                status: status.as_u16(),
                body: truncate(&response_text, ERROR_BODY_LIMIT),
            });
        }

        let rows: Vec<ProductRecord> = match serde_json::from_str(&response_text) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text, LOG_BODY_LIMIT),
                    "Failed to parse record store response"
                );
                return Err(FetchError::Parse(e));
            }
        };

        if rows.len() > 1 {
            warn!(rows = rows.len(), "Multiple products share an identifier, using the first");
        }

        let record = rows
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))?;

        if !record.is_displayable() {
            tracing::error!("Record store returned a product without a name");
            return Err(FetchError::InvalidRecord(format!(
                "product {id} has an empty name"
            )));
        }

        Ok(record)
    }
}

/// `<base>/rest/v1/products`, tolerating a base that already ends in the REST root.
fn products_endpoint(base: &Url) -> Url {
    let mut url = base.clone();
    let path = base.path().trim_end_matches('/');
    let rest_root = if path.ends_with(REST_PATH) {
        path.to_string()
    } else {
        format!("{path}{REST_PATH}")
    };
    url.set_path(&format!("{rest_root}/products"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Lookup URL filtered by exact identifier match with the given projection.
fn product_lookup_url(endpoint: &Url, id: &ProductIdentifier, projection: Projection) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("product_id", &format!("eq.{id}"))
        .append_pair("select", projection.columns());
    url
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
