//! Security headers middleware.
//!
//! The share page runs exactly one inline script (the app redirect), loads
//! one stylesheet, and shows images from the configured allow-list. The CSP
//! allows that and nothing else.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;
use crate::state::AppState;

/// Build the `Content-Security-Policy` value for one response.
///
/// ```text
/// default-src 'none';
/// script-src 'nonce-<nonce>';
/// style-src 'self';
/// img-src 'self' <allow-listed hosts>;
/// font-src 'self';
/// connect-src 'none';
/// base-uri 'none';
/// form-action 'none';
/// frame-ancestors 'none'
/// ```
#[must_use]
pub fn content_security_policy(nonce: Option<&str>, img_sources: &str) -> String {
    let script_src = match nonce {
        Some(nonce) if !nonce.is_empty() => format!("'nonce-{nonce}'"),
        _ => "'none'".to_string(),
    };

    let img_src = if img_sources.is_empty() {
        "'self'".to_string()
    } else {
        format!("'self' {img_sources}")
    };

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         img-src {img_src}; \
         font-src 'self'; \
         connect-src 'none'; \
         base-uri 'none'; \
         form-action 'none'; \
         frame-ancestors 'none'"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `Content-Security-Policy` - see [`content_security_policy`]
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: strict-origin-when-cross-origin` - Unfurlers still see the origin
/// - `Cache-Control: no-store, max-age=0` - Unless the handler set one
/// - `Cross-Origin-Opener-Policy: same-origin` - Process isolation
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();

    let mut response = next.run(request).await;

    let csp = content_security_policy(
        nonce.as_ref().map(CspNonce::value),
        state.csp_img_sources(),
    );

    let headers = response.headers_mut();

    match HeaderValue::from_str(&csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid CSP header value, falling back to deny-all");
            headers.insert(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'"),
            );
        }
    }

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    response
}
