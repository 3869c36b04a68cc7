//! Normalization of listing responses.
//!
//! The list endpoints do not commit to one body shape. Three are accepted:
//!
//! - a bare JSON array of entries
//! - `{ "data": [...], "total"?, "page"?, "pageSize"? }`
//! - `{ "items": [...], "total"?, "page"?, "pageSize"? }`
//!
//! Anything else decodes to an empty page instead of an error.

use crate::data::Page;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Paging metadata carried by object-shaped responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub total: Option<u64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A listing body classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEnvelope {
    Bare(Vec<Value>),
    Data { entries: Vec<Value>, meta: PageMeta },
    Items { entries: Vec<Value>, meta: PageMeta },
    Unrecognized,
}

fn as_count(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn meta_from(obj: &Map<String, Value>) -> PageMeta {
    PageMeta {
        total: as_count(obj.get("total")),
        page: as_count(obj.get("page")).and_then(|n| u32::try_from(n).ok()),
        page_size: as_count(obj.get("pageSize"))
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0),
    }
}

impl ListEnvelope {
    /// Classify a response body. `None` (204) is unrecognized.
    pub fn classify(raw: Option<Value>) -> Self {
        match raw {
            Some(Value::Array(entries)) => Self::Bare(entries),
            Some(Value::Object(mut obj)) => {
                let meta = meta_from(&obj);
                match (obj.remove("data"), obj.remove("items")) {
                    (Some(Value::Array(entries)), _) => Self::Data { entries, meta },
                    (_, Some(Value::Array(entries))) => Self::Items { entries, meta },
                    _ => Self::Unrecognized,
                }
            }
            _ => Self::Unrecognized,
        }
    }

    fn into_parts(self) -> Option<(Vec<Value>, PageMeta)> {
        match self {
            Self::Bare(entries) => Some((entries, PageMeta::default())),
            Self::Data { entries, meta } | Self::Items { entries, meta } => Some((entries, meta)),
            Self::Unrecognized => None,
        }
    }

    /// Decode every entry, or nothing: a single bad entry makes the body unusable.
    fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>) -> Option<Vec<T>> {
        entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| tracing::warn!("Discarding listing with undecodable entry: {}", e))
            .ok()
    }

    /// Entries without paging, for endpoints that return everything at once.
    pub fn into_items<T: DeserializeOwned>(self) -> Vec<T> {
        let Some((entries, _meta)) = self.into_parts() else {
            tracing::warn!("Unrecognized listing shape, treating as empty");
            return Vec::new();
        };
        Self::decode_entries(entries).unwrap_or_default()
    }

    /// Normalize into a page, falling back to the requested paging values.
    ///
    /// The result never holds more than `page_size` entries and its total is
    /// never below the number of entries held.
    pub fn into_page<T: DeserializeOwned>(self, requested_page: u32, requested_page_size: u32) -> Page<T> {
        let Some((entries, meta)) = self.into_parts() else {
            tracing::warn!("Unrecognized listing shape, treating as empty");
            return Page::empty(requested_page, requested_page_size);
        };

        let Some(mut items) = Self::decode_entries::<T>(entries) else {
            return Page::empty(requested_page, requested_page_size);
        };

        let total = meta.total.unwrap_or(items.len() as u64);
        let page = meta.page.unwrap_or(requested_page);
        let page_size = meta.page_size.unwrap_or(requested_page_size);

        if items.len() > page_size as usize {
            tracing::warn!(
                "Listing returned {} entries for page size {}, truncating",
                items.len(),
                page_size
            );
            items.truncate(page_size as usize);
        }

        Page {
            total: total.max(items.len() as u64),
            items,
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_shapes() {
        assert!(matches!(
            ListEnvelope::classify(Some(json!([1, 2]))),
            ListEnvelope::Bare(ref e) if e.len() == 2
        ));
        assert!(matches!(
            ListEnvelope::classify(Some(json!({"data": [], "total": 4}))),
            ListEnvelope::Data { meta: PageMeta { total: Some(4), .. }, .. }
        ));
        assert!(matches!(
            ListEnvelope::classify(Some(json!({"items": [1]}))),
            ListEnvelope::Items { .. }
        ));
        assert_eq!(ListEnvelope::classify(Some(json!({"results": []}))), ListEnvelope::Unrecognized);
        assert_eq!(ListEnvelope::classify(Some(json!("nope"))), ListEnvelope::Unrecognized);
        assert_eq!(ListEnvelope::classify(None), ListEnvelope::Unrecognized);
    }

    #[test]
    fn test_data_wins_over_items() {
        let envelope = ListEnvelope::classify(Some(json!({"data": [1], "items": [1, 2]})));
        assert!(matches!(envelope, ListEnvelope::Data { ref entries, .. } if entries.len() == 1));
    }

    #[test]
    fn test_non_array_data_falls_through_to_items() {
        let envelope = ListEnvelope::classify(Some(json!({"data": null, "items": [1]})));
        assert!(matches!(envelope, ListEnvelope::Items { .. }));
    }

    #[test]
    fn test_meta_ignores_non_numbers() {
        let envelope = ListEnvelope::classify(Some(json!({
            "data": [],
            "total": "12",
            "page": 2,
            "pageSize": 0
        })));
        let ListEnvelope::Data { meta, .. } = envelope else {
            panic!("expected data envelope");
        };
        assert_eq!(meta, PageMeta { total: None, page: Some(2), page_size: None });
    }

    #[test]
    fn test_page_truncated_to_page_size() {
        let page: Page<u32> = ListEnvelope::classify(Some(json!([1, 2, 3, 4, 5]))).into_page(1, 2);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page_size, 2);
    }

    #[test]
    fn test_total_raised_to_entry_count() {
        let page: Page<u32> =
            ListEnvelope::classify(Some(json!({"items": [1, 2, 3], "total": 1}))).into_page(1, 20);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_bad_entry_empties_listing() {
        let page: Page<u32> = ListEnvelope::classify(Some(json!([1, "two", 3]))).into_page(3, 20);
        assert_eq!(page, Page::empty(3, 20));

        let items: Vec<u32> = ListEnvelope::classify(Some(json!({"data": [1, {}]}))).into_items();
        assert!(items.is_empty());
    }
}
