//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every error renders the
//! error page with a status matching its [`FailureKind`]; server-side
//! failures are captured to Sentry first. Details never reach the visitor.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::filters;
use crate::records::{FailureKind, FetchError};

/// Application-level error type for the share server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Product lookup failed.
    #[error("Record store error: {0}")]
    RecordStore(#[from] FetchError),

    /// No route or resource matched.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Classify the error for the visitor-facing page.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::RecordStore(err) => err.kind(),
            Self::NotFound(_) => FailureKind::NotFound,
        }
    }
}

/// Centered message page for failed lookups.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPageTemplate {
    pub heading: &'static str,
    pub message: &'static str,
}

impl ErrorPageTemplate {
    /// Visitor-facing copy for a failure.
    #[must_use]
    pub const fn for_kind(kind: FailureKind) -> Self {
        match kind {
            FailureKind::NotFound => Self {
                heading: "Product not found",
                message: "This product may have been removed or the link is out of date.",
            },
            FailureKind::InvalidIdentifier => Self {
                heading: "Invalid product link",
                message: "This link does not point to a product.",
            },
            FailureKind::LoadFailed | FailureKind::Misconfigured => Self {
                heading: "Failed to load product",
                message: "Please try again in a moment.",
            },
        }
    }
}

/// HTTP status for a failure.
#[must_use]
pub const fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::NotFound | FailureKind::InvalidIdentifier => StatusCode::NOT_FOUND,
        FailureKind::LoadFailed => StatusCode::BAD_GATEWAY,
        FailureKind::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        // Capture server errors to Sentry
        if kind.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Not found");
        }

        let status = status_for(kind);
        let page = ErrorPageTemplate::for_kind(kind);

        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to render error page");
                (status, page.heading).into_response()
            }
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
