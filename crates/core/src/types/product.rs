//! Product record as returned by the record store.

use serde::{Deserialize, Deserializer, Serialize};

/// A product as stored in the record store's `products` table.
///
/// Records are read-only: they are materialized from one lookup, used for
/// one page render, and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Display name.
    #[serde(rename = "product_name")]
    pub name: String,
    /// Image URLs, primary image first. `null` and missing decode to empty.
    #[serde(
        rename = "image_uri",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub images: Vec<String>,
    /// Free-text description, only present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductRecord {
    /// Returns the primary image, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Returns the description if it has any visible text.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Whether the record has the fields a page needs.
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_projection() {
        let json = r#"{"product_name":"Test Widget","image_uri":["https://cdn.example.com/w.png"]}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.name, "Test Widget");
        assert_eq!(record.primary_image(), Some("https://cdn.example.com/w.png"));
        assert!(record.description.is_none());
    }

    #[test]
    fn test_null_images_decode_to_empty() {
        let json = r#"{"product_name":"Bare","image_uri":null}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert!(record.images.is_empty());
        assert_eq!(record.primary_image(), None);
    }

    #[test]
    fn test_missing_images_decode_to_empty() {
        let json = r#"{"product_name":"Bare"}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert!(record.images.is_empty());
    }

    #[test]
    fn test_description_projection() {
        let json = r#"{"product_name":"Lamp","image_uri":[],"description":"  Warm light.  "}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.description(), Some("Warm light."));

        let blank = r#"{"product_name":"Lamp","description":"   "}"#;
        let record: ProductRecord = serde_json::from_str(blank).unwrap();
        assert_eq!(record.description(), None);
    }

    #[test]
    fn test_displayable() {
        let record = ProductRecord {
            name: "  ".to_string(),
            images: Vec::new(),
            description: None,
        };
        assert!(!record.is_displayable());
    }

    #[test]
    fn test_rows_array() {
        // The record store always answers with an array of rows
        let rows: Vec<ProductRecord> =
            serde_json::from_str(r#"[{"product_name":"A","image_uri":["/a.png","/b.png"]}]"#)
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].primary_image(), Some("/a.png"));
    }
}
