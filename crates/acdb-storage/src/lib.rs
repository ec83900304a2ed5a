//! Canonical bucket rendering plus atomic, all-or-nothing output storage.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use acdb_core::{sort_canonical, CharacterEntry, Envelope, SortKeyed};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info_span};
use uuid::Uuid;

pub const CRATE_NAME: &str = "acdb-storage";

pub const BACKUPS_DIR: &str = "backups";

/// Sorts a bucket canonically and wraps it in a `{total_entries, generated_by}` envelope.
pub fn render_bucket<T: Serialize + SortKeyed>(
    mut entries: Vec<T>,
    generated_by: &str,
) -> anyhow::Result<Vec<u8>> {
    sort_canonical(&mut entries);
    render_json(&Envelope::canonical(entries, generated_by))
}

/// Same as [`render_bucket`], after back-filling every absent required field so consumers
/// of the incomplete bucket can rely on key presence.
pub fn render_incomplete(
    mut entries: Vec<CharacterEntry>,
    generated_by: &str,
) -> anyhow::Result<Vec<u8>> {
    for entry in &mut entries {
        entry.fill_required_placeholders();
    }
    render_bucket(entries, generated_by)
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).context("serializing output document")
}

#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PendingWrite {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content_hash: String,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub backup_path: Option<PathBuf>,
    /// The target already held identical bytes; nothing was written.
    pub unchanged: bool,
}

#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    backups: bool,
}

struct Staged {
    temp_path: PathBuf,
    target: PathBuf,
    content_hash: String,
    byte_size: usize,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backups: true,
        }
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// First eight hex characters of the SHA-256 digest, used for cache busting.
    pub fn short_hash(bytes: &[u8]) -> String {
        let mut hash = Self::sha256_hex(bytes);
        hash.truncate(8);
        hash
    }

    pub fn backup_relative_path(&self, stamp: DateTime<Utc>, file_name: &str) -> PathBuf {
        PathBuf::from(BACKUPS_DIR)
            .join(stamp.format("%Y%m%d_%H%M%S").to_string())
            .join(file_name)
    }

    /// Writes one file through a temp file and rename.
    pub fn write_atomic(
        &self,
        stamp: DateTime<Utc>,
        file_name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile> {
        self.commit(stamp, vec![PendingWrite::new(file_name, bytes.to_vec())])?
            .into_iter()
            .next()
            .with_context(|| format!("no result for {file_name}"))
    }

    /// Writes every file or none of them: all contents are staged as temp files next to
    /// their targets before the first target is replaced. Existing targets are backed up
    /// under `backups/<stamp>/` when backups are enabled.
    pub fn commit(
        &self,
        stamp: DateTime<Utc>,
        writes: Vec<PendingWrite>,
    ) -> anyhow::Result<Vec<StoredFile>> {
        let span = info_span!("commit_outputs", root = %self.root.display(), files = writes.len());
        let _guard = span.enter();

        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating output directory {}", self.root.display()))?;

        let mut staged: Vec<Staged> = Vec::new();
        let mut results: Vec<Option<StoredFile>> = Vec::with_capacity(writes.len());

        for write in &writes {
            let target = self.root.join(&write.file_name);
            let content_hash = Self::sha256_hex(&write.bytes);

            if Self::holds_hash(&target, &content_hash) {
                debug!(file = %write.file_name, "output unchanged");
                results.push(Some(StoredFile {
                    content_hash,
                    absolute_path: target,
                    byte_size: write.bytes.len(),
                    backup_path: None,
                    unchanged: true,
                }));
                continue;
            }

            match Self::stage(&target, &write.bytes) {
                Ok(temp_path) => {
                    staged.push(Staged {
                        temp_path,
                        target,
                        content_hash,
                        byte_size: write.bytes.len(),
                    });
                    results.push(None);
                }
                Err(err) => {
                    discard(&staged);
                    return Err(err);
                }
            }
        }

        let mut backups = Vec::with_capacity(staged.len());
        for item in &staged {
            match self.backup_existing(stamp, &item.target) {
                Ok(path) => backups.push(path),
                Err(err) => {
                    discard(&staged);
                    return Err(err);
                }
            }
        }

        let mut renamed = Vec::with_capacity(staged.len());
        for (idx, (item, backup_path)) in staged.iter().zip(backups).enumerate() {
            if let Err(err) = fs::rename(&item.temp_path, &item.target) {
                discard(&staged[idx..]);
                return Err(err).with_context(|| {
                    format!(
                        "atomically renaming {} -> {}",
                        item.temp_path.display(),
                        item.target.display()
                    )
                });
            }
            debug!(path = %item.target.display(), bytes = item.byte_size, "output written");
            renamed.push(StoredFile {
                content_hash: item.content_hash.clone(),
                absolute_path: item.target.clone(),
                byte_size: item.byte_size,
                backup_path,
                unchanged: false,
            });
        }

        let mut renamed = renamed.into_iter();
        Ok(results
            .into_iter()
            .filter_map(|slot| slot.or_else(|| renamed.next()))
            .collect())
    }

    fn holds_hash(target: &Path, content_hash: &str) -> bool {
        fs::read(target)
            .map(|existing| Self::sha256_hex(&existing) == content_hash)
            .unwrap_or(false)
    }

    fn stage(target: &Path, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .with_context(|| format!("opening temp output file {}", temp_path.display()))?;
        let written = file
            .write_all(bytes)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("writing temp output file {}", temp_path.display()));
        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
        Ok(temp_path)
    }

    fn backup_existing(&self, stamp: DateTime<Utc>, target: &Path) -> anyhow::Result<Option<PathBuf>> {
        if !self.backups || !target.exists() {
            return Ok(None);
        }
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let backup_path = self.root.join(self.backup_relative_path(stamp, &file_name));
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating backup directory {}", parent.display()))?;
        }
        fs::copy(target, &backup_path).with_context(|| {
            format!("backing up {} -> {}", target.display(), backup_path.display())
        })?;
        Ok(Some(backup_path))
    }
}

fn discard(staged: &[Staged]) {
    for item in staged {
        let _ = fs::remove_file(&item.temp_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acdb_core::{CharacterField, GENERATED_BY};
    use serde_json::{json, Value as JsonValue};
    use tempfile::tempdir;

    fn stamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
            .expect("ts")
            .with_timezone(&Utc)
    }

    fn entry(work_type: &str, work_name: &str, character_name: &str) -> CharacterEntry {
        CharacterEntry::new()
            .with(CharacterField::WorkType, work_type)
            .with(CharacterField::WorkName, work_name)
            .with(CharacterField::CharacterName, character_name)
    }

    #[test]
    fn content_hashing_is_stable() {
        let hash = OutputStore::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(OutputStore::short_hash(b"hello world"), "b94d27b9");
    }

    #[test]
    fn bucket_render_sorts_and_counts() {
        let bytes = render_bucket(
            vec![entry("Movie", "Ace", "Bob"), entry("Book", "Zed", "Ann")],
            GENERATED_BY,
        )
        .unwrap();
        let value: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["metadata"]["total_entries"], json!(2));
        assert_eq!(value["metadata"]["generated_by"], json!(GENERATED_BY));
        assert_eq!(value["characters"][0]["work_type"], json!("Book"));
        assert_eq!(value["characters"][1]["work_type"], json!("Movie"));
    }

    #[test]
    fn incomplete_render_back_fills_required_fields() {
        let bytes = render_incomplete(vec![entry("Game", "Portal", "GLaDOS")], GENERATED_BY).unwrap();
        let value: JsonValue = serde_json::from_slice(&bytes).unwrap();
        let first = &value["characters"][0];
        assert_eq!(first["source_urls"], json!([]));
        assert_eq!(first["alignment_rating_explanation"], json!(""));
        assert_eq!(first["character_name"], json!("GLaDOS"));
        assert!(first.get("publication_year").is_none());
    }

    #[test]
    fn commit_writes_all_files_and_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let store = OutputStore::new(dir.path());
        let stored = store
            .commit(
                stamp(),
                vec![
                    PendingWrite::new("a.json", b"{}".to_vec()),
                    PendingWrite::new("b.json", b"[]".to_vec()),
                ],
            )
            .expect("commit");

        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|s| !s.unchanged && s.backup_path.is_none()));
        assert_eq!(fs::read(dir.path().join("a.json")).unwrap(), b"{}");
        assert_eq!(fs::read(dir.path().join("b.json")).unwrap(), b"[]");
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn overwrite_backs_up_previous_content() {
        let dir = tempdir().expect("tempdir");
        let store = OutputStore::new(dir.path());
        store.write_atomic(stamp(), "db.json", b"old").expect("first write");
        let second = store.write_atomic(stamp(), "db.json", b"new").expect("second write");

        let backup = second.backup_path.expect("backup path");
        assert_eq!(
            backup,
            dir.path().join("backups").join("20260224_120000").join("db.json")
        );
        assert_eq!(fs::read(&backup).unwrap(), b"old");
        assert_eq!(fs::read(dir.path().join("db.json")).unwrap(), b"new");
    }

    #[test]
    fn identical_content_is_left_alone() {
        let dir = tempdir().expect("tempdir");
        let store = OutputStore::new(dir.path());
        store.write_atomic(stamp(), "db.json", b"same").expect("first write");
        let again = store.write_atomic(stamp(), "db.json", b"same").expect("second write");
        assert!(again.unchanged);
        assert!(again.backup_path.is_none());
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn disabled_backups_skip_copy() {
        let dir = tempdir().expect("tempdir");
        let store = OutputStore::new(dir.path()).with_backups(false);
        store.write_atomic(stamp(), "db.json", b"old").expect("first write");
        let second = store.write_atomic(stamp(), "db.json", b"new").expect("second write");
        assert!(second.backup_path.is_none());
        assert!(!dir.path().join("backups").exists());
    }
}
