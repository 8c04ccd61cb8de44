//! Core types for the share page.

pub mod identifier;
pub mod product;

pub use identifier::{IdentifierError, ProductIdentifier};
pub use product::ProductRecord;
