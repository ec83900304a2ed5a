//! Core record model for the AI character database.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub mod entry;
pub mod key;
pub mod schema;

pub use entry::{is_empty_value, is_truthy, CharacterEntry, RawEntry, SchemaViolation};
pub use key::{sort_canonical, CatalogKey, IdentityKey, SortKey, SortKeyed};
pub use schema::{CharacterField, PresenceRule, UnknownField};

pub const CRATE_NAME: &str = "acdb-core";

/// Provenance tag written into the metadata of every bucket file.
pub const GENERATED_BY: &str = "acdb-reconcile";

/// Mutually exclusive classification of a record after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Valid,
    Invalid,
    Incomplete,
    MultiWork,
    Duplicate,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Valid,
        Bucket::Invalid,
        Bucket::Incomplete,
        Bucket::MultiWork,
        Bucket::Duplicate,
    ];

    /// Fixed output file name for the bucket.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Valid => "ai-character-db.json",
            Self::Invalid => "invalid-entries.json",
            Self::Incomplete => "incomplete-entries.json",
            Self::MultiWork => "multi-work-entries.json",
            Self::Duplicate => "duplicate-entries.json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Incomplete => "incomplete",
            Self::MultiWork => "multi-work",
            Self::Duplicate => "duplicate",
        }
    }
}

/// `{ "metadata": {...}, "characters": [...] }`, the shape of every file this system writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub characters: Vec<T>,
}

impl<T> Envelope<T> {
    /// Envelope whose metadata is only `{total_entries, generated_by}`.
    pub fn canonical(characters: Vec<T>, generated_by: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("total_entries".into(), JsonValue::from(characters.len()));
        metadata.insert("generated_by".into(), JsonValue::from(generated_by));
        Self {
            metadata,
            characters,
        }
    }

    /// Keeps existing metadata and refreshes `total_entries`.
    pub fn with_refreshed_count(mut self) -> Self {
        self.metadata
            .insert("total_entries".into(), JsonValue::from(self.characters.len()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucket_file_names_are_distinct() {
        let mut names = Bucket::ALL.iter().map(|b| b.file_name()).collect::<Vec<_>>();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Bucket::ALL.len());
    }

    #[test]
    fn canonical_envelope_metadata() {
        let envelope = Envelope::canonical(vec![1, 2, 3], GENERATED_BY);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "metadata": {"total_entries": 3, "generated_by": "acdb-reconcile"},
                "characters": [1, 2, 3]
            })
        );
    }

    #[test]
    fn refreshed_count_keeps_other_metadata() {
        let mut envelope: Envelope<u8> = serde_json::from_value(json!({
            "metadata": {"total_entries": 9, "source": "manual review"},
            "characters": [7]
        }))
        .unwrap();
        envelope = envelope.with_refreshed_count();
        assert_eq!(envelope.metadata["total_entries"], json!(1));
        assert_eq!(envelope.metadata["source"], json!("manual review"));
    }
}
