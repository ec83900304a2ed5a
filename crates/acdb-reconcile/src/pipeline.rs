//! The reconciliation core and the merge run that feeds it from disk.

use std::path::PathBuf;

use acdb_core::{Bucket, CharacterEntry, RawEntry, SchemaViolation, GENERATED_BY};
use acdb_sources::{discover_source_files, load_sources};
use acdb_storage::{render_bucket, render_incomplete, OutputStore, PendingWrite};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::classify::{all_same_facts, is_multi_work};
use crate::completeness::partition_by_completeness;
use crate::config::ReconcileConfig;
use crate::dedup::remove_exact_duplicates;
use crate::group::group_by_identity;
use crate::merge::merge_group;
use crate::rules::{FieldRenameHook, FieldRenameRules};
use crate::split::{run_split, SplitSummary};
use crate::validate::partition_by_schema;

/// Rewrites the raw entry list after exact-duplicate removal and before schema validation.
pub trait EntryHook: Send + Sync {
    fn apply(&self, entries: Vec<RawEntry>) -> Vec<RawEntry>;
}

#[derive(Default)]
pub struct NoopEntryHook;

impl EntryHook for NoopEntryHook {
    fn apply(&self, entries: Vec<RawEntry>) -> Vec<RawEntry> {
        entries
    }
}

/// The five output buckets of one run. Every entry that survives exact-duplicate removal
/// lands in exactly one of them, except same-fact groups, which collapse into one valid entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub valid: Vec<CharacterEntry>,
    pub invalid: Vec<SchemaViolation>,
    pub incomplete: Vec<CharacterEntry>,
    pub multi_work: Vec<CharacterEntry>,
    pub duplicate: Vec<CharacterEntry>,
}

impl Buckets {
    pub fn count(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Valid => self.valid.len(),
            Bucket::Invalid => self.invalid.len(),
            Bucket::Incomplete => self.incomplete.len(),
            Bucket::MultiWork => self.multi_work.len(),
            Bucket::Duplicate => self.duplicate.len(),
        }
    }

    /// Serializes all five files up front. Nothing is written here.
    pub fn render(&self, generated_by: &str) -> Result<Vec<PendingWrite>> {
        let invalid = self
            .invalid
            .iter()
            .map(|violation| violation.entry.clone())
            .collect::<Vec<_>>();
        Ok(vec![
            PendingWrite::new(
                Bucket::Valid.file_name(),
                render_bucket(self.valid.clone(), generated_by)?,
            ),
            PendingWrite::new(Bucket::Invalid.file_name(), render_bucket(invalid, generated_by)?),
            PendingWrite::new(
                Bucket::Incomplete.file_name(),
                render_incomplete(self.incomplete.clone(), generated_by)?,
            ),
            PendingWrite::new(
                Bucket::MultiWork.file_name(),
                render_bucket(self.multi_work.clone(), generated_by)?,
            ),
            PendingWrite::new(
                Bucket::Duplicate.file_name(),
                render_bucket(self.duplicate.clone(), generated_by)?,
            ),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub loaded_entries: usize,
    pub exact_duplicates_removed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub incomplete: usize,
    pub multi_work: usize,
    pub duplicate: usize,
    /// Same-fact groups of two or more collapsed into one valid entry.
    pub merged_groups: usize,
    /// Entries absorbed by those merges, beyond the one kept per group.
    pub merged_away: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub buckets: Buckets,
    pub stats: ReconcileStats,
}

pub struct Reconciler {
    hook: Box<dyn EntryHook>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            hook: Box::<NoopEntryHook>::default(),
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn EntryHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Installs the field rename hook when the config asks for it.
    pub fn from_config(config: &ReconcileConfig) -> Result<Self> {
        let reconciler = Self::new();
        if !config.apply_renames {
            return Ok(reconciler);
        }
        let rules = FieldRenameRules::from_rules_dir(&config.rules_dir)?;
        Ok(reconciler.with_hook(Box::new(FieldRenameHook::new(rules))))
    }

    pub fn reconcile(&self, entries: Vec<RawEntry>) -> Reconciliation {
        let loaded_entries = entries.len();
        let (entries, exact_duplicates_removed) = remove_exact_duplicates(entries);
        info!(
            loaded = loaded_entries,
            removed = exact_duplicates_removed,
            "removed identical entries"
        );

        let entries = self.hook.apply(entries);

        let (typed, invalid) = partition_by_schema(entries);
        info!(invalid = invalid.len(), remaining = typed.len(), "schema check");

        let (mut arena, incomplete) = partition_by_completeness(typed);
        info!(incomplete = incomplete.len(), remaining = arena.len(), "completeness check");

        let mut multi_work_idx = Vec::new();
        let mut single_work_idx = Vec::new();
        for group in group_by_identity(&arena, 0..arena.len()) {
            if !group.is_single() && is_multi_work(&group.entries(&arena)) {
                debug!(
                    character = %group.key.character_name,
                    work = %group.key.work_name,
                    members = group.len(),
                    "identity spans several works"
                );
                multi_work_idx.extend(group.members);
            } else {
                single_work_idx.extend(group.members);
            }
        }
        info!(multi_work = multi_work_idx.len(), remaining = single_work_idx.len(), "multi-work check");

        let mut valid_idx = Vec::new();
        let mut duplicate_idx = Vec::new();
        let mut merged = Vec::new();
        let mut merged_away = 0;
        for group in group_by_identity(&arena, single_work_idx) {
            if group.is_single() {
                valid_idx.extend(group.members);
                continue;
            }
            let members = group.entries(&arena);
            if all_same_facts(&members) {
                debug!(
                    character = %group.key.character_name,
                    work = %group.key.work_name,
                    members = group.len(),
                    "merged same-fact group"
                );
                merged.push(merge_group(&members));
                merged_away += group.len() - 1;
            } else {
                debug!(
                    character = %group.key.character_name,
                    work = %group.key.work_name,
                    members = group.len(),
                    "conflicting facts"
                );
                duplicate_idx.extend(group.members);
            }
        }

        let merged_groups = merged.len();
        let mut take = |indices: Vec<usize>| -> Vec<CharacterEntry> {
            indices
                .into_iter()
                .map(|idx| std::mem::take(&mut arena[idx]))
                .collect()
        };
        let multi_work = take(multi_work_idx);
        let duplicate = take(duplicate_idx);
        let mut valid = take(valid_idx);
        valid.extend(merged);
        info!(
            valid = valid.len(),
            duplicate = duplicate.len(),
            merged_groups,
            "duplicate check"
        );

        let stats = ReconcileStats {
            loaded_entries,
            exact_duplicates_removed,
            valid: valid.len(),
            invalid: invalid.len(),
            incomplete: incomplete.len(),
            multi_work: multi_work.len(),
            duplicate: duplicate.len(),
            merged_groups,
            merged_away,
        };
        Reconciliation {
            buckets: Buckets {
                valid,
                invalid,
                incomplete,
                multi_work,
                duplicate,
            },
            stats,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_files: usize,
    pub loaded_files: usize,
    pub skipped_files: Vec<PathBuf>,
    pub stats: ReconcileStats,
    pub dry_run: bool,
    /// Outputs replaced on disk; unchanged outputs are not listed.
    pub written: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    pub split: Option<SplitSummary>,
}

/// Discovers and loads every source, reconciles, then writes all five buckets in one commit.
/// Files that fail to load are skipped; a failure to write is returned.
pub fn run_merge(config: &ReconcileConfig, reconciler: &Reconciler) -> Result<MergeRunSummary> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    let span = info_span!("merge_run", %run_id);
    let _guard = span.enter();

    let files = discover_source_files(&config.workspace_root, config.include_batches)?;
    info!(files = files.len(), root = %config.workspace_root.display(), "discovered source files");

    let report = load_sources(&files);
    let loaded_files = report.loaded_files();
    let skipped_files = report
        .skipped()
        .map(|err| err.path().to_path_buf())
        .collect::<Vec<_>>();
    info!(
        entries = report.entries.len(),
        loaded_files,
        skipped = skipped_files.len(),
        "loaded sources"
    );

    let reconciliation = reconciler.reconcile(report.entries);
    let writes = reconciliation.buckets.render(GENERATED_BY)?;

    let mut written = Vec::new();
    let mut backups = Vec::new();
    let mut split = None;
    if config.dry_run {
        info!("dry run, no files written");
    } else {
        let store = OutputStore::new(&config.output_dir).with_backups(config.backups);
        for stored in store.commit(started_at, writes)? {
            if let Some(backup) = stored.backup_path {
                backups.push(backup);
            }
            if !stored.unchanged {
                written.push(stored.absolute_path);
            }
        }
        info!(written = written.len(), backups = backups.len(), "outputs committed");

        if config.split_after_merge {
            match run_split(config) {
                Ok(summary) => split = Some(summary),
                Err(err) => warn!("splitting canonical file by work type failed: {err:#}"),
            }
        }
    }

    Ok(MergeRunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        source_files: files.len(),
        loaded_files,
        skipped_files,
        stats: reconciliation.stats,
        dry_run: config.dry_run,
        written,
        backups,
        split,
    })
}
