//! HTTP route handlers for the share server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (record store configured)
//! GET  /robots.txt             - Allow crawlers and link unfurlers
//! GET  /favicon.ico            - Empty response
//!
//! # Share pages
//! GET  /product/{id}           - Product share page (canonical)
//! GET  /{id}                   - Product share page (legacy link shape)
//!
//! GET  /static/*               - Stylesheet and assets (mounted in `app`)
//! ```

pub mod health;
pub mod products;

use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::IntoResponse,
    routing::get,
};

use crate::error::AppError;
use crate::state::AppState;

/// Create all routes for the share server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/robots.txt", get(robots_txt))
        .route("/favicon.ico", get(favicon))
        .route("/product/{id}", get(products::show))
        .route("/{id}", get(products::show_legacy))
        .fallback(not_found)
}

/// Share pages exist to be crawled by link unfurlers.
async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "User-agent: *\nAllow: /\n",
    )
}

/// Keeps browsers' automatic favicon requests off the product route.
async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
