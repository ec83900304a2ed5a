//! Collapses the duplicate bucket on demand with the pairwise merge.

use std::path::PathBuf;

use acdb_core::{Bucket, CharacterEntry};
use acdb_storage::StoredFile;
use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::documents::{output_store, read_document, render_with_metadata, typed_entries};
use crate::group::group_by_identity;
use crate::merge::fold_duplicates;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entries: Vec<CharacterEntry>,
    /// Identity groups of two or more that were folded into one entry.
    pub groups_merged: usize,
}

/// Groups by identity key in first-appearance order and folds each group of two or more,
/// members in list order. Singletons pass through.
pub fn resolve_duplicates(entries: Vec<CharacterEntry>) -> Resolution {
    let groups = group_by_identity(&entries, 0..entries.len());
    let mut resolved = Vec::with_capacity(groups.len());
    let mut groups_merged = 0;
    for group in &groups {
        let members = group
            .members
            .iter()
            .map(|&idx| entries[idx].clone())
            .collect::<Vec<_>>();
        if let Some(merged) = fold_duplicates(&members) {
            if !group.is_single() {
                debug!(
                    character = %group.key.character_name,
                    work = %group.key.work_name,
                    members = group.len(),
                    "merged duplicate group"
                );
                groups_merged += 1;
            }
            resolved.push(merged);
        }
    }
    Resolution {
        entries: resolved,
        groups_merged,
    }
}

#[derive(Debug, Clone)]
pub struct ResolveSummary {
    pub path: PathBuf,
    pub entries_before: usize,
    pub entries_after: usize,
    pub groups_merged: usize,
    /// `None` on a dry run.
    pub written: Option<StoredFile>,
}

/// Rewrites the duplicate bucket in place, keeping its metadata apart from `total_entries`.
pub fn run_resolve(config: &ReconcileConfig) -> Result<ResolveSummary> {
    let path = config.bucket_path(Bucket::Duplicate);
    let doc = read_document(&path)?;
    let metadata = doc.metadata_or_default();
    let entries = typed_entries(&path, doc)?;
    let entries_before = entries.len();

    let resolution = resolve_duplicates(entries);
    let entries_after = resolution.entries.len();
    info!(
        before = entries_before,
        after = entries_after,
        groups = resolution.groups_merged,
        "resolved duplicate entries"
    );

    let written = if config.dry_run {
        None
    } else {
        let bytes = render_with_metadata(metadata, resolution.entries)?;
        Some(output_store(config).write_atomic(Utc::now(), Bucket::Duplicate.file_name(), &bytes)?)
    };

    Ok(ResolveSummary {
        path,
        entries_before,
        entries_after,
        groups_merged: resolution.groups_merged,
        written,
    })
}
