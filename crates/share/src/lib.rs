//! Xetivo Share library.
//!
//! Serves product share pages: one record store lookup, a share card with
//! social preview metadata, and an app-or-web redirect. Exposed as a library
//! so the router can be tested end to end.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod images;
pub mod middleware;
pub mod page;
pub mod records;
pub mod routes;
pub mod state;

use axum::{Router, extract::Request};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use state::AppState;

/// Build the full application router with middleware.
///
/// Sentry layers are added by the binary so tests can run without a client.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config().static_dir.clone();

    routes::routes()
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                    )
                }))
                .layer(axum::middleware::from_fn(
                    middleware::request_id_middleware,
                ))
                .layer(axum::middleware::from_fn(middleware::csp_nonce_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::security_headers_middleware,
                )),
        )
        .with_state(state)
}
