//! Exact-duplicate removal across all loaded entries.

use std::collections::HashSet;

use acdb_core::RawEntry;
use acdb_storage::OutputStore;
use serde_json::Value as JsonValue;

/// SHA-256 of the entry's key-sorted compact JSON, ignoring a top-level `metadata` key.
pub fn fingerprint(entry: &RawEntry) -> String {
    let mut map = entry.as_map().clone();
    map.remove("metadata");
    let canonical = JsonValue::Object(map).to_string();
    OutputStore::sha256_hex(canonical.as_bytes())
}

/// Keeps the first occurrence of every distinct entry, in load order. Returns the survivors
/// and how many copies were dropped.
pub fn remove_exact_duplicates(entries: Vec<RawEntry>) -> (Vec<RawEntry>, usize) {
    let total = entries.len();
    let mut seen = HashSet::with_capacity(total);
    let unique = entries
        .into_iter()
        .filter(|entry| seen.insert(fingerprint(entry)))
        .collect::<Vec<_>>();
    let removed = total - unique.len();
    (unique, removed)
}
