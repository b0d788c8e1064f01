//! Result document types.
//!
//! The engine assembles extracted values into an ordered tree: keys
//! appear in configuration order, `all: true` nodes collect into
//! arrays, and a repeated key appends instead of overwriting (an
//! existing array pushes, a scalar promotes to a two-element array).

// ============================================================================
// Imports
// ============================================================================

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;

// ============================================================================
// Merge Semantics
// ============================================================================

/// Inserts `value` under `key` with append-on-collision semantics.
pub fn merge_entry(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let prior = existing.take();
            *existing = Value::Array(vec![prior, value]);
        }
    }
}

/// Merges every entry of `from` into `into`, appending on collisions.
pub fn merge_map(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        merge_entry(into, &key, value);
    }
}

// ============================================================================
// LinkRecord
// ============================================================================

/// One captured link: a URL plus the metadata evaluated alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRecord {
    /// Resolved URL.
    pub url: String,
    /// Metadata evaluated against the capturing element.
    pub metadata: Map<String, Value>,
}

impl LinkRecord {
    /// Renders the record as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("url".to_string(), Value::String(self.url.clone()));
        map.insert("metadata".to_string(), Value::Object(self.metadata.clone()));
        Value::Object(map)
    }
}

// ============================================================================
// LinkStore
// ============================================================================

/// Captured links grouped by name, in first-capture order.
///
/// Page entries reference these via `link: $name`.
#[derive(Debug, Clone, Default)]
pub struct LinkStore {
    entries: Vec<(String, Vec<LinkRecord>)>,
}

impl LinkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record under `name`.
    pub fn push(&mut self, name: &str, record: LinkRecord) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, records)) => records.push(record),
            None => self.entries.push((name.to_string(), vec![record])),
        }
    }

    /// Returns the records captured under `name`, in capture order.
    #[must_use]
    pub fn get(&self, name: &str) -> &[LinkRecord] {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map_or(&[], |(_, records)| records.as_slice())
    }

    /// Returns `true` if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LinkStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, records) in &self.entries {
            map.serialize_entry(name, records)?;
        }
        map.end()
    }
}

// ============================================================================
// ScrawlOutput
// ============================================================================

/// Everything a scrawl run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScrawlOutput {
    /// Result tree keyed by page then node identifiers.
    pub data: Value,
    /// Global link registry.
    pub links: LinkStore,
}

impl ScrawlOutput {
    /// Serializes the output document to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_merge_entry_inserts_fresh_key() {
        let mut map = Map::new();
        merge_entry(&mut map, "title", json!("a"));
        assert_eq!(map["title"], json!("a"));
    }

    #[test]
    fn test_merge_entry_promotes_scalar_to_array() {
        let mut map = Map::new();
        merge_entry(&mut map, "title", json!("a"));
        merge_entry(&mut map, "title", json!("b"));
        assert_eq!(map["title"], json!(["a", "b"]));
    }

    #[test]
    fn test_merge_entry_appends_to_existing_array() {
        let mut map = Map::new();
        merge_entry(&mut map, "title", json!(["a", "b"]));
        merge_entry(&mut map, "title", json!("c"));
        assert_eq!(map["title"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_merge_preserves_insertion_order() {
        let mut map = Map::new();
        merge_entry(&mut map, "z", json!(1));
        merge_entry(&mut map, "a", json!(2));

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_link_store_groups_by_name() {
        let mut store = LinkStore::new();
        store.push(
            "chapters",
            LinkRecord {
                url: "/one".to_string(),
                metadata: Map::new(),
            },
        );
        store.push(
            "chapters",
            LinkRecord {
                url: "/two".to_string(),
                metadata: Map::new(),
            },
        );

        let records = store.get("chapters");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "/one");
        assert!(store.get("missing").is_empty());
    }

    #[test]
    fn test_output_serializes_links_as_map() {
        let mut store = LinkStore::new();
        store.push(
            "chapters",
            LinkRecord {
                url: "/one".to_string(),
                metadata: Map::new(),
            },
        );

        let output = ScrawlOutput {
            data: json!({"page-0": {}}),
            links: store,
        };
        let rendered = output.to_json().unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["links"]["chapters"][0]["url"], json!("/one"));
    }
}
