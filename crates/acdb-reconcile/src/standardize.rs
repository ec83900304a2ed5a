//! Work type standardization of the canonical file.

use std::collections::BTreeMap;

use acdb_core::{CharacterEntry, CharacterField, GENERATED_BY};
use acdb_storage::StoredFile;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::documents::{output_store, read_document, render_with_metadata, typed_entries};
use crate::rules::WorkTypeRules;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousChange {
    pub character_name: String,
    pub work_name: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingChange {
    pub from: String,
    pub to: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandardizeReport {
    /// Entry count per work type before and after.
    pub before: BTreeMap<String, usize>,
    pub after: BTreeMap<String, usize>,
    pub ambiguous: Vec<AmbiguousChange>,
    /// Most frequent first, ties by name.
    pub mapped: Vec<MappingChange>,
}

impl StandardizeReport {
    pub fn entries_mapped(&self) -> usize {
        self.mapped.iter().map(|m| m.entries).sum()
    }

    pub fn changed(&self) -> bool {
        !self.ambiguous.is_empty() || !self.mapped.is_empty()
    }

    /// Most common work types after standardization, with the count before when it moved.
    pub fn top_after(&self, limit: usize) -> Vec<(&str, usize, Option<usize>)> {
        let mut counts = self.after.iter().collect::<Vec<_>>();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        counts
            .into_iter()
            .take(limit)
            .map(|(work_type, &count)| {
                let before = self.before.get(work_type).copied().unwrap_or(0);
                (work_type.as_str(), count, (before != count).then_some(before))
            })
            .collect()
    }
}

fn work_type_counts(entries: &[CharacterEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts
            .entry(entry.text(CharacterField::WorkType).to_string())
            .or_insert(0) += 1;
    }
    counts
}

/// Applies per-character resolutions first, then the renaming map.
pub fn standardize(rules: &WorkTypeRules, entries: &mut [CharacterEntry]) -> StandardizeReport {
    let before = work_type_counts(entries);

    let mut ambiguous = Vec::new();
    for entry in entries.iter_mut() {
        let resolved = rules
            .resolution_for(
                entry.text(CharacterField::WorkName),
                entry.text(CharacterField::CharacterName),
            )
            .map(str::to_string);
        let Some(to) = resolved else { continue };
        let from = entry.text(CharacterField::WorkType).to_string();
        if from == to {
            continue;
        }
        debug!(character = %entry.text(CharacterField::CharacterName), %from, %to, "resolved ambiguous work type");
        ambiguous.push(AmbiguousChange {
            character_name: entry.text(CharacterField::CharacterName).to_string(),
            work_name: entry.text(CharacterField::WorkName).to_string(),
            from,
            to: to.clone(),
        });
        entry.set(CharacterField::WorkType, JsonValue::String(to));
    }

    let mut mapped: BTreeMap<(String, String), usize> = BTreeMap::new();
    for entry in entries.iter_mut() {
        let from = entry.text(CharacterField::WorkType).to_string();
        let Some(to) = rules.mapped(&from).map(str::to_string) else {
            continue;
        };
        *mapped.entry((from, to.clone())).or_insert(0) += 1;
        entry.set(CharacterField::WorkType, JsonValue::String(to));
    }
    let mut mapped = mapped
        .into_iter()
        .map(|((from, to), entries)| MappingChange { from, to, entries })
        .collect::<Vec<_>>();
    mapped.sort_by(|a, b| b.entries.cmp(&a.entries));

    StandardizeReport {
        before,
        after: work_type_counts(entries),
        ambiguous,
        mapped,
    }
}

#[derive(Debug, Clone)]
pub struct StandardizeSummary {
    pub report: StandardizeReport,
    pub written: Option<StoredFile>,
}

/// Rewrites the canonical file with standardized work types, backing up the previous file,
/// and marks its metadata with `work_types_standardized`.
pub fn run_standardize(config: &ReconcileConfig, rules: &WorkTypeRules) -> Result<StandardizeSummary> {
    let path = config.canonical_path();
    let doc = read_document(&path)?;
    let mut metadata = doc.metadata_or_default();
    let mut entries = typed_entries(&path, doc)?;

    let report = standardize(rules, &mut entries);
    info!(
        before = report.before.len(),
        after = report.after.len(),
        ambiguous = report.ambiguous.len(),
        mapped = report.entries_mapped(),
        "standardized work types"
    );

    if config.dry_run {
        return Ok(StandardizeSummary {
            report,
            written: None,
        });
    }

    metadata.insert("work_types_standardized".into(), JsonValue::Bool(true));
    metadata.insert("generated_by".into(), JsonValue::from(GENERATED_BY));
    let bytes = render_with_metadata(metadata, entries)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let written = output_store(config).write_atomic(Utc::now(), &file_name, &bytes)?;

    Ok(StandardizeSummary {
        report,
        written: Some(written),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::character;
    use acdb_core::{Bucket, Envelope};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> Vec<CharacterEntry> {
        vec![
            character("Cell", "Dragon Ball", "Anime"),
            character("HAL 9000", "2001: A Space Odyssey", "Film"),
            character("Ava", "Ex Machina", "Film"),
            character("Data", "Star Trek", "TV Series"),
            character("Bob", "Bobiverse", "Book Series"),
        ]
    }

    #[test]
    fn resolutions_then_mapping() {
        let mut entries = sample();
        let report = standardize(&WorkTypeRules::default(), &mut entries);

        assert_eq!(
            report.ambiguous,
            vec![AmbiguousChange {
                character_name: "Cell".into(),
                work_name: "Dragon Ball".into(),
                from: "Anime".into(),
                to: "Manga".into(),
            }]
        );
        assert_eq!(
            report.mapped[0],
            MappingChange {
                from: "Film".into(),
                to: "Movie".into(),
                entries: 2
            }
        );
        assert_eq!(report.entries_mapped(), 3);
        assert_eq!(entries[1].text(CharacterField::WorkType), "Movie");
        assert_eq!(entries[4].text(CharacterField::WorkType), "Book");
        assert_eq!(report.before.len(), 4);
        assert_eq!(report.after.len(), 4);
        assert_eq!(report.top_after(1), vec![("Movie", 2, Some(0))]);
    }

    #[test]
    fn already_standard_entries_are_untouched() {
        let mut entries = vec![character("Cell", "Dragon Ball", "Manga")];
        let report = standardize(&WorkTypeRules::default(), &mut entries);
        assert!(!report.changed());
    }

    #[test]
    fn rewrite_marks_metadata_and_backs_up() {
        let dir = tempdir().expect("tempdir");
        let config = ReconcileConfig::for_root(dir.path());
        let mut envelope = Envelope::canonical(sample(), "somewhere-else");
        envelope.metadata.insert("last_updated".into(), json!("2026-01-01"));
        fs::write(config.canonical_path(), serde_json::to_vec(&envelope).unwrap()).expect("fixture");

        let summary = run_standardize(&config, &WorkTypeRules::default()).expect("standardize");
        let written = summary.written.expect("written");
        assert!(written.backup_path.is_some());

        let value: JsonValue =
            serde_json::from_slice(&fs::read(config.bucket_path(Bucket::Valid)).unwrap()).unwrap();
        assert_eq!(value["metadata"]["work_types_standardized"], json!(true));
        assert_eq!(value["metadata"]["generated_by"], json!(GENERATED_BY));
        assert_eq!(value["metadata"]["last_updated"], json!("2026-01-01"));
        assert_eq!(value["metadata"]["total_entries"], json!(5));
        let types = value["characters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["work_type"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert!(!types.contains(&"Film".to_string()));
    }
}
