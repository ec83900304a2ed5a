//! Backfill: copies facts from the incomplete bucket into matching canonical entries, keyed
//! by [`CatalogKey`], then drops the matched entries from the incomplete bucket.

use std::collections::{HashMap, HashSet};

use acdb_core::{Bucket, CatalogKey, CharacterEntry, CharacterField};
use acdb_storage::{PendingWrite, StoredFile};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::documents::{output_store, read_document, render_with_metadata, typed_entries};

/// Absent, `null` or a whitespace-only string.
fn is_missing(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillUpdate {
    pub key: CatalogKey,
    pub fields: Vec<CharacterField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub canonical: Vec<CharacterEntry>,
    pub incomplete: Vec<CharacterEntry>,
    /// Incomplete entries whose key exists in the canonical set.
    pub matched: Vec<CatalogKey>,
    pub updates: Vec<BackfillUpdate>,
}

impl Backfill {
    pub fn fields_added(&self) -> usize {
        self.updates.iter().map(|u| u.fields.len()).sum()
    }
}

/// Fields the canonical entry is missing and the incomplete entry can supply.
pub fn missing_fields(
    canonical: &CharacterEntry,
    incomplete: &CharacterEntry,
) -> Vec<(CharacterField, JsonValue)> {
    incomplete
        .fields()
        .filter(|(field, value)| is_missing(canonical.get(*field)) && !is_missing(Some(*value)))
        .map(|(field, value)| (field, value.clone()))
        .collect()
}

/// When a key repeats within one file, its last entry is the one matched.
pub fn backfill(canonical: Vec<CharacterEntry>, incomplete: Vec<CharacterEntry>) -> Backfill {
    let mut canonical = canonical;
    let canonical_slots = canonical
        .iter()
        .enumerate()
        .map(|(idx, entry)| (entry.catalog_key(), idx))
        .collect::<HashMap<_, _>>();

    let mut latest: HashMap<CatalogKey, usize> = HashMap::new();
    let mut order: Vec<CatalogKey> = Vec::new();
    for (idx, entry) in incomplete.iter().enumerate() {
        let key = entry.catalog_key();
        if latest.insert(key.clone(), idx).is_none() {
            order.push(key);
        }
    }

    let mut matched = Vec::new();
    let mut updates = Vec::new();
    for key in order {
        let Some(&slot) = canonical_slots.get(&key) else {
            continue;
        };
        let source = &incomplete[latest[&key]];
        let fields = missing_fields(&canonical[slot], source);
        if !fields.is_empty() {
            debug!(
                character = %key.character_name,
                work = %key.work_name,
                fields = fields.len(),
                "backfilling canonical entry"
            );
            let target = &mut canonical[slot];
            for (field, value) in &fields {
                target.set(*field, value.clone());
            }
            updates.push(BackfillUpdate {
                key: key.clone(),
                fields: fields.into_iter().map(|(field, _)| field).collect(),
            });
        }
        matched.push(key);
    }

    let matched_keys = matched.iter().collect::<HashSet<_>>();
    let incomplete = incomplete
        .into_iter()
        .filter(|entry| !matched_keys.contains(&entry.catalog_key()))
        .collect();

    Backfill {
        canonical,
        incomplete,
        matched,
        updates,
    }
}

#[derive(Debug, Clone)]
pub struct BackfillSummary {
    pub canonical_entries: usize,
    pub incomplete_before: usize,
    pub incomplete_after: usize,
    pub matched: Vec<CatalogKey>,
    pub updates: Vec<BackfillUpdate>,
    pub written: Vec<StoredFile>,
}

impl BackfillSummary {
    pub fn fields_added(&self) -> usize {
        self.updates.iter().map(|u| u.fields.len()).sum()
    }
}

/// Updates the canonical file and prunes the incomplete file in one commit. Files that would
/// not change are left alone.
pub fn run_backfill(config: &ReconcileConfig) -> Result<BackfillSummary> {
    let canonical_path = config.canonical_path();
    let incomplete_path = config.bucket_path(Bucket::Incomplete);

    let canonical_doc = read_document(&canonical_path)?;
    let canonical_meta = canonical_doc.metadata_or_default();
    let canonical = typed_entries(&canonical_path, canonical_doc)?;

    let incomplete_doc = read_document(&incomplete_path)?;
    let incomplete_meta = incomplete_doc.metadata_or_default();
    let incomplete = typed_entries(&incomplete_path, incomplete_doc)?;
    let incomplete_before = incomplete.len();

    let result = backfill(canonical, incomplete);
    info!(
        matched = result.matched.len(),
        entries_updated = result.updates.len(),
        fields_added = result.fields_added(),
        "backfill"
    );

    let mut written = Vec::new();
    if !config.dry_run {
        let mut writes = Vec::new();
        if !result.updates.is_empty() {
            writes.push(PendingWrite::new(
                Bucket::Valid.file_name(),
                render_with_metadata(canonical_meta, result.canonical.clone())?,
            ));
        }
        if !result.matched.is_empty() {
            writes.push(PendingWrite::new(
                Bucket::Incomplete.file_name(),
                render_with_metadata(incomplete_meta, result.incomplete.clone())?,
            ));
        }
        if !writes.is_empty() {
            written = output_store(config).commit(Utc::now(), writes)?;
        }
    }

    Ok(BackfillSummary {
        canonical_entries: result.canonical.len(),
        incomplete_before,
        incomplete_after: result.incomplete.len(),
        matched: result.matched,
        updates: result.updates,
        written,
    })
}
