//! Reconciliation of harvested character entries into one canonical dataset.
//!
//! The core ([`Reconciler::reconcile`]) is infallible and works on an in-memory snapshot:
//! exact-duplicate removal, schema validation, completeness, two identity grouping passes
//! and same-fact merging. Data-quality problems end up in buckets; only I/O errors abort a
//! run. The remaining modules are the maintenance tools that operate on the bucket files.

pub mod backfill;
pub mod classify;
pub mod completeness;
pub mod config;
pub mod dedup;
mod documents;
pub mod group;
pub mod merge;
pub mod pipeline;
pub mod repair;
pub mod resolve;
pub mod rules;
pub mod split;
pub mod standardize;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ReconcileConfig;
pub use pipeline::{
    run_merge, Buckets, EntryHook, MergeRunSummary, NoopEntryHook, ReconcileStats, Reconciler,
    Reconciliation,
};
pub use rules::{FieldRenameHook, FieldRenameRules, WorkTypeRules};

pub const CRATE_NAME: &str = "acdb-reconcile";
