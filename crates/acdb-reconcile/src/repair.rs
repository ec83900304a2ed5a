//! Fix-invalid: moves legacy field names in the invalid bucket onto the schema.

use std::path::PathBuf;

use acdb_core::{Bucket, RawEntry, GENERATED_BY};
use acdb_storage::StoredFile;
use anyhow::Result;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::config::ReconcileConfig;
use crate::documents::{output_store, read_document, render_with_metadata};
use crate::rules::FieldRenameRules;
use crate::validate::unexpected_fields;

/// Written next to the buckets, so the next merge run picks the repaired entries up.
pub const FIXED_FILE: &str = "fixed-entries.json";
const FIXED_NOTE: &str = "Field names converted from old schema to new schema";

#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    pub entries: Vec<RawEntry>,
    /// Entries that fit the schema after renaming.
    pub now_valid: usize,
}

pub fn repair_entries(rules: &FieldRenameRules, entries: Vec<RawEntry>) -> Repair {
    let entries = entries
        .into_iter()
        .map(|entry| rules.apply(entry))
        .collect::<Vec<_>>();
    let now_valid = entries
        .iter()
        .filter(|entry| unexpected_fields(entry).is_empty())
        .count();
    Repair { entries, now_valid }
}

#[derive(Debug, Clone)]
pub struct RepairSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub total: usize,
    pub now_valid: usize,
    pub written: Option<StoredFile>,
}

impl RepairSummary {
    pub fn still_invalid(&self) -> usize {
        self.total - self.now_valid
    }
}

/// Reads the invalid bucket and writes every entry, renamed, to [`FIXED_FILE`]. Entries that
/// still carry unknown fields are written too.
pub fn run_fix_invalid(config: &ReconcileConfig, rules: &FieldRenameRules) -> Result<RepairSummary> {
    let input = config.bucket_path(Bucket::Invalid);
    let doc = read_document(&input)?;
    let repair = repair_entries(rules, doc.characters);
    let total = repair.entries.len();
    info!(total, now_valid = repair.now_valid, "repaired invalid entries");

    let mut metadata = Map::new();
    metadata.insert("generated_by".into(), JsonValue::from(GENERATED_BY));
    metadata.insert("note".into(), JsonValue::from(FIXED_NOTE));

    let written = if config.dry_run {
        None
    } else {
        let bytes = render_with_metadata(metadata, repair.entries)?;
        Some(output_store(config).write_atomic(Utc::now(), FIXED_FILE, &bytes)?)
    };

    Ok(RepairSummary {
        input,
        output: config.output_dir.join(FIXED_FILE),
        total,
        now_valid: repair.now_valid,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::raw;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn counts_entries_that_now_fit_the_schema() {
        let repair = repair_entries(
            &FieldRenameRules::default(),
            vec![
                raw(json!({"name": "Skynet", "film": "The Terminator", "year": 1984})),
                raw(json!({"character_name": "Mother", "ship": "Nostromo"})),
            ],
        );
        assert_eq!(repair.now_valid, 1);
        assert_eq!(repair.entries[0].get("publication_year"), Some(&json!(1984)));
        assert!(repair.entries[1].contains_key("ship"));
    }

    #[test]
    fn writes_fixed_file_with_note() {
        let dir = tempdir().expect("tempdir");
        let config = ReconcileConfig::for_root(dir.path());
        fs::write(
            config.bucket_path(Bucket::Invalid),
            r#"{"metadata": {"total_entries": 1}, "characters": [{"name": "Skynet", "work": "The Terminator"}]}"#,
        )
        .expect("fixture");

        let summary = run_fix_invalid(&config, &FieldRenameRules::default()).expect("repair");
        assert_eq!((summary.total, summary.now_valid, summary.still_invalid()), (1, 1, 0));

        let value: JsonValue =
            serde_json::from_slice(&fs::read(dir.path().join(FIXED_FILE)).unwrap()).unwrap();
        assert_eq!(value["metadata"]["total_entries"], json!(1));
        assert_eq!(value["metadata"]["generated_by"], json!(GENERATED_BY));
        assert_eq!(value["metadata"]["note"], json!(FIXED_NOTE));
        assert_eq!(
            value["characters"][0],
            json!({"character_name": "Skynet", "work_name": "The Terminator"})
        );
    }
}
