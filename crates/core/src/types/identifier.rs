//! Product identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductIdentifier`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The input string is empty or only whitespace.
    #[error("product identifier cannot be empty")]
    Empty,
    /// The input is a placeholder left behind by a broken share link.
    #[error("product identifier is the placeholder value {0:?}")]
    Placeholder(String),
    /// The input string is too long.
    #[error("product identifier must be at most {max} bytes")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a control character.
    #[error("product identifier contains a control character")]
    ControlCharacter,
    /// The raw path segment could not be decoded to text.
    #[error("product identifier is not valid UTF-8")]
    InvalidEncoding,
}

/// The identifier of a product as it appears in a share URL.
///
/// Identifiers are opaque tokens assigned by the record store. This type only
/// rejects input that can never name a real product.
///
/// ## Constraints
///
/// - Not empty, not whitespace-only
/// - Not the literal `"undefined"` (emitted by clients that share a link
///   before the product has loaded)
/// - At most 128 bytes
/// - No control characters
///
/// ## Examples
///
/// ```
/// use xetivo_share_core::ProductIdentifier;
///
/// assert!(ProductIdentifier::parse("abc123").is_ok());
///
/// assert!(ProductIdentifier::parse("").is_err());
/// assert!(ProductIdentifier::parse("undefined").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ProductIdentifier(String);

impl ProductIdentifier {
    /// Maximum length of an identifier in bytes.
    pub const MAX_LENGTH: usize = 128;

    /// Placeholder values that are never valid identifiers.
    pub const PLACEHOLDERS: &'static [&'static str] = &["undefined"];

    /// Parse a `ProductIdentifier` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, a known placeholder, longer
    /// than [`Self::MAX_LENGTH`], or contains control characters.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if s.trim().is_empty() {
            return Err(IdentifierError::Empty);
        }

        if Self::PLACEHOLDERS.contains(&s) {
            return Err(IdentifierError::Placeholder(s.to_owned()));
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(IdentifierError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(char::is_control) {
            return Err(IdentifierError::ControlCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier percent-encoded for use as a URL path segment.
    #[must_use]
    pub fn as_path_segment(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// Consumes the identifier and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProductIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductIdentifier> for String {
    fn from(id: ProductIdentifier) -> Self {
        id.0
    }
}

impl core::str::FromStr for ProductIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
