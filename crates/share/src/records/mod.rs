//! Record store client.
//!
//! # Architecture
//!
//! - The record store is a PostgREST-style REST API (`/rest/v1/<table>`)
//! - Read-only: one GET per page render, filtered by `product_id=eq.<id>`
//! - No caching and no retries; every render sees the current row
//! - Only the columns the page renders are selected (see [`Projection`])
//!
//! # Example
//!
//! ```rust,ignore
//! use xetivo_share::records::{Projection, RecordStoreClient};
//!
//! let client = RecordStoreClient::new(&config.record_store);
//! let product = client.fetch_product(&id, Projection::Minimal).await?;
//! ```

mod client;

pub use client::RecordStoreClient;

use thiserror::Error;
use xetivo_share_core::IdentifierError;

/// Columns requested from the `products` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Name and images only.
    Minimal,
    /// Name, images, and description.
    WithDescription,
}

impl Projection {
    /// Value of the `select` query parameter.
    #[must_use]
    pub const fn columns(self) -> &'static str {
        match self {
            Self::Minimal => "product_name,image_uri",
            Self::WithDescription => "product_name,image_uri,description",
        }
    }
}

/// Errors that can occur when fetching a product.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Record store URL or key is not configured.
    #[error("Record store not configured: missing {0}")]
    Configuration(&'static str),

    /// No row matched the identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The identifier can never match a product.
    #[error("Invalid product identifier: {0}")]
    MalformedInput(#[from] IdentifierError),

    /// Record store answered with a non-success status.
    #[error("Record store returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A row was returned but cannot be displayed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// How a failed lookup is presented to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The product does not exist.
    NotFound,
    /// The link itself is broken.
    InvalidIdentifier,
    /// The record store could not be reached or answered badly.
    LoadFailed,
    /// The server is missing record store configuration.
    Misconfigured,
}

impl FailureKind {
    /// Whether the failure is the server's fault and should be reported.
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        matches!(self, Self::LoadFailed | Self::Misconfigured)
    }
}

impl FetchError {
    /// Classify the error for the visitor-facing page.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Misconfigured,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::MalformedInput(_) => FailureKind::InvalidIdentifier,
            Self::Transport { .. } | Self::Http(_) | Self::Parse(_) | Self::InvalidRecord(_) => {
                FailureKind::LoadFailed
            }
        }
    }

    /// Whether the visitor should see "not found" semantics.
    ///
    /// Malformed identifiers are treated the same as unknown ones.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::MalformedInput(_))
    }
}
