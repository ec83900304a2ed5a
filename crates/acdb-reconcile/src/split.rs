//! Per-work-type files for progressive loading, plus a manifest and a cache-busting version.

use std::collections::BTreeMap;
use std::path::PathBuf;

use acdb_core::{CharacterEntry, CharacterField};
use acdb_storage::{render_json, OutputStore, PendingWrite};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{info, warn};

use crate::config::ReconcileConfig;
use crate::documents::{read_document, typed_entries};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VERSION_FILE: &str = "version.json";
/// Bucket for entries without a work type.
pub const OTHER_WORK_TYPE: &str = "Other";

/// `"Light Novel"` → `"light-novel"`, `"TV/Film"` → `"tv-film"`; anything but alphanumerics
/// and `-` is dropped.
pub fn work_type_slug(work_type: &str) -> String {
    work_type
        .to_lowercase()
        .replace(&[' ', '/'][..], "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkTypeFile {
    pub work_type: String,
    pub character_count: usize,
    pub characters: Vec<CharacterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub work_type: String,
    pub filename: String,
    pub character_count: usize,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub metadata: Map<String, JsonValue>,
    pub generated_at: String,
    pub total_characters: usize,
    pub work_types: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub timestamp: String,
    pub last_updated: String,
    pub data_version: String,
}

#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Per-type files followed by the manifest, relative to the split directory.
    pub data_files: Vec<PendingWrite>,
    pub version_file: PendingWrite,
    pub manifest: Manifest,
    pub version: VersionInfo,
}

fn work_type_of(entry: &CharacterEntry) -> String {
    let work_type = entry.text(CharacterField::WorkType);
    if work_type.trim().is_empty() {
        OTHER_WORK_TYPE.to_string()
    } else {
        work_type.to_string()
    }
}

/// Groups by work type (sorted by name, entries in file order) and renders every output.
pub fn plan_split(
    metadata: Map<String, JsonValue>,
    entries: Vec<CharacterEntry>,
    now: DateTime<Utc>,
) -> Result<SplitPlan> {
    let total_characters = entries.len();
    let mut by_type: BTreeMap<String, Vec<CharacterEntry>> = BTreeMap::new();
    for entry in entries {
        by_type.entry(work_type_of(&entry)).or_default().push(entry);
    }

    let generated_at = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    let mut data_files = Vec::with_capacity(by_type.len() + 1);
    let mut work_types = Vec::with_capacity(by_type.len());
    for (work_type, characters) in by_type {
        let filename = format!("{}.json", work_type_slug(&work_type));
        if work_types.iter().any(|e: &ManifestEntry| e.filename == filename) {
            warn!(%work_type, %filename, "work type slug collides with an earlier work type");
        }
        let file = WorkTypeFile {
            work_type: work_type.clone(),
            character_count: characters.len(),
            characters,
        };
        let bytes = render_json(&file)?;
        work_types.push(ManifestEntry {
            work_type,
            filename: filename.clone(),
            character_count: file.character_count,
            hash: OutputStore::short_hash(&bytes),
        });
        data_files.push(PendingWrite::new(filename, bytes));
    }

    let last_updated = metadata
        .get("last_updated")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();
    let manifest = Manifest {
        metadata,
        generated_at: generated_at.clone(),
        total_characters,
        work_types,
    };
    data_files.push(PendingWrite::new(MANIFEST_FILE, render_json(&manifest)?));

    let compact = serde_json::to_vec(&manifest).context("serializing manifest")?;
    let version = VersionInfo {
        version: OutputStore::short_hash(&compact),
        timestamp: generated_at.clone(),
        last_updated,
        data_version: generated_at,
    };
    let version_file = PendingWrite::new(VERSION_FILE, render_json(&version)?);

    Ok(SplitPlan {
        data_files,
        version_file,
        manifest,
        version,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub total_characters: usize,
    pub work_types: usize,
    pub version: String,
    /// Empty on a dry run.
    pub written: Vec<PathBuf>,
}

/// Splits the canonical file into the split directory and writes `version.json` next to the
/// bucket files. Split outputs are regenerated on every run and never backed up.
pub fn run_split(config: &ReconcileConfig) -> Result<SplitSummary> {
    let path = config.canonical_path();
    let doc = read_document(&path)?;
    let metadata = doc.metadata_or_default();
    let entries = typed_entries(&path, doc)?;

    let now = Utc::now();
    let plan = plan_split(metadata, entries, now)?;
    let mut summary = SplitSummary {
        total_characters: plan.manifest.total_characters,
        work_types: plan.manifest.work_types.len(),
        version: plan.version.version.clone(),
        written: Vec::new(),
    };
    if config.dry_run {
        return Ok(summary);
    }

    let data_store = OutputStore::new(&config.split_dir).with_backups(false);
    let root_store = OutputStore::new(&config.output_dir).with_backups(false);
    for stored in data_store.commit(now, plan.data_files)? {
        summary.written.push(stored.absolute_path);
    }
    let version = root_store.write_atomic(now, VERSION_FILE, &plan.version_file.bytes)?;
    summary.written.push(version.absolute_path);

    info!(
        characters = summary.total_characters,
        work_types = summary.work_types,
        version = %summary.version,
        dir = %config.split_dir.display(),
        "split canonical file by work type"
    );
    Ok(summary)
}
