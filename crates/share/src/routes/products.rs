//! Product share page handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State, rejection::PathRejection};
use tracing::instrument;
use xetivo_share_core::{IdentifierError, ProductIdentifier};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::page::ProductPage;
use crate::records::FetchError;
use crate::state::AppState;

/// Product share page template.
#[derive(Template, WebTemplate)]
#[template(path = "product.html")]
pub struct ProductPageTemplate {
    pub page: ProductPage,
    pub nonce: String,
}

/// Display the share page for a product.
///
/// # Errors
///
/// Renders the not-found page for unknown or malformed identifiers and the
/// load-failed page when the record store lookup fails.
#[instrument(skip(state, path, nonce))]
pub async fn show(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    CspNonce(nonce): CspNonce,
) -> Result<ProductPageTemplate> {
    render(&state, path, nonce).await
}

/// Display the share page from the legacy `/{id}` link shape.
///
/// Older app builds share `/<id>`; the page is identical and its canonical URL
/// points at `/product/<id>`.
///
/// # Errors
///
/// Same as [`show`].
#[instrument(skip(state, path, nonce))]
pub async fn show_legacy(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    CspNonce(nonce): CspNonce,
) -> Result<ProductPageTemplate> {
    render(&state, path, nonce).await
}

/// Validate the path token.
///
/// A segment that does not decode to UTF-8 is a broken link like any other
/// malformed identifier, not a bad request.
fn parse_identifier(
    path: std::result::Result<Path<String>, PathRejection>,
) -> std::result::Result<ProductIdentifier, FetchError> {
    let Path(raw_id) = path.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable product path");
        IdentifierError::InvalidEncoding
    })?;

    Ok(ProductIdentifier::parse(&raw_id)?)
}

async fn render(
    state: &AppState,
    path: std::result::Result<Path<String>, PathRejection>,
    nonce: String,
) -> Result<ProductPageTemplate> {
    // Rejected before any lookup is issued
    let id = parse_identifier(path)?;

    add_breadcrumb(
        "share",
        "Viewed product share page",
        Some(&[("product_id", id.as_str())]),
    );

    let config = state.config();
    let record = state
        .records()
        .fetch_product(&id, config.page.projection())
        .await?;

    Ok(ProductPageTemplate {
        page: ProductPage::build(config, &id, &record),
        nonce,
    })
}
