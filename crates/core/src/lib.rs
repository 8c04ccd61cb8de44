//! Xetivo Share Core - Shared domain types.
//!
//! This crate provides the types behind the product share page:
//! - `share` - the server that renders share pages
//! - `integration-tests` - end-to-end tests against a fake record store
//!
//! # Architecture
//!
//! The core crate contains only types and pure state machines - no I/O, no
//! HTTP clients, no clocks. Callers supply time explicitly so every
//! transition can be tested synthetically.
//!
//! # Modules
//!
//! - [`types`] - Validated product identifiers and product records
//! - [`redirect`] - App-or-web redirect arbitration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod redirect;
pub mod types;

pub use redirect::{
    ArbitrationState, Navigation, RedirectArbiter, RedirectPlan, RedirectTiming,
    RedirectTimingError,
};
pub use types::*;
