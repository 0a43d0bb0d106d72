//! Normalized records extracted from provider pages and API responses.

use serde::{Deserialize, Serialize};

/// Item author as shown on the provider's result card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    /// Provider-side handle, empty when the page does not expose one.
    pub username: String,
}

/// Provider-specific discriminator carried alongside the common fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceKind {
    /// Scraped stock-media item (photo, vector, psd).
    Media { media_type: String },
    /// Marketplace item with a price tag.
    Marketplace { price_cents: u64, category: String },
}

impl Default for ResourceKind {
    fn default() -> Self {
        ResourceKind::Media {
            media_type: String::new(),
        }
    }
}

/// One normalized result record.
///
/// A `Resource` is a pure projection of a single page or API snapshot; it
/// holds no reference back to the tab that produced it and outlives the page.
/// Missing fields default to the empty string rather than failing the whole
/// record, except `id` and `url`: records without both are dropped during
/// extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-native identifier.
    pub id: String,
    pub title: String,
    /// Canonical item page.
    pub url: String,
    /// Thumbnail / preview image.
    pub preview_url: String,
    pub author: Author,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

impl Resource {
    /// Hard post-condition of extraction: a returned record always has a
    /// non-empty identity and a navigable URL.
    pub fn has_identity(&self) -> bool {
        !self.id.is_empty() && !self.url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_both_id_and_url() {
        let mut r = Resource {
            id: "101".into(),
            url: "https://example.com/item/101".into(),
            ..Default::default()
        };
        assert!(r.has_identity());

        r.id.clear();
        assert!(!r.has_identity());

        r.id = "101".into();
        r.url.clear();
        assert!(!r.has_identity());
    }

    #[test]
    fn serializes_with_flattened_kind() {
        let r = Resource {
            id: "7".into(),
            url: "https://example.com/7".into(),
            kind: ResourceKind::Media {
                media_type: "photo".into(),
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "media");
        assert_eq!(json["media_type"], "photo");
    }
}
