//! Reading and rewriting the bucket files the maintenance tools operate on.

use std::path::Path;

use acdb_core::{sort_canonical, CharacterEntry, Envelope, SortKeyed};
use acdb_sources::{load_source_file, SourceDocument};
use acdb_storage::{render_json, OutputStore};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::config::ReconcileConfig;
use crate::validate::partition_by_schema;

/// A tool's input file. Unlike merge inputs, a missing or broken file aborts the tool.
pub(crate) fn read_document(path: &Path) -> Result<SourceDocument> {
    load_source_file(path).with_context(|| format!("loading {}", path.display()))
}

/// Entries of a file this system wrote itself, which must all fit the schema.
pub(crate) fn typed_entries(path: &Path, doc: SourceDocument) -> Result<Vec<CharacterEntry>> {
    let (entries, violations) = partition_by_schema(doc.characters);
    if let Some(first) = violations.first() {
        bail!(
            "{}: {} entries carry fields outside the schema ({first})",
            path.display(),
            violations.len()
        );
    }
    Ok(entries)
}

/// Canonically sorted envelope that keeps `metadata` and refreshes `total_entries`.
pub(crate) fn render_with_metadata<T: Serialize + SortKeyed>(
    metadata: Map<String, JsonValue>,
    mut entries: Vec<T>,
) -> Result<Vec<u8>> {
    sort_canonical(&mut entries);
    render_json(
        &Envelope {
            metadata,
            characters: entries,
        }
        .with_refreshed_count(),
    )
}

pub(crate) fn output_store(config: &ReconcileConfig) -> OutputStore {
    OutputStore::new(&config.output_dir).with_backups(config.backups)
}
