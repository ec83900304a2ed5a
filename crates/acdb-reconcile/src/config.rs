use std::path::PathBuf;

use acdb_core::Bucket;

pub const RULES_DIR: &str = "rules";
pub const SPLIT_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Directory whose top-level `*.json` files are the inputs.
    pub workspace_root: PathBuf,
    /// Where bucket files, `version.json` and backups are written.
    pub output_dir: PathBuf,
    pub rules_dir: PathBuf,
    /// Per-work-type files and their manifest.
    pub split_dir: PathBuf,
    pub include_batches: bool,
    pub dry_run: bool,
    pub backups: bool,
    pub apply_renames: bool,
    pub split_after_merge: bool,
}

impl ReconcileConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            output_dir: root.clone(),
            rules_dir: root.join(RULES_DIR),
            split_dir: root.join(SPLIT_DIR),
            workspace_root: root,
            include_batches: false,
            dry_run: false,
            backups: true,
            apply_renames: false,
            split_after_merge: true,
        }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("ACDB_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let mut config = Self::for_root(root);
        if let Ok(dir) = std::env::var("ACDB_OUTPUT_DIR") {
            config = config.with_output_dir(dir);
        }
        if let Ok(dir) = std::env::var("ACDB_RULES_DIR") {
            config.rules_dir = PathBuf::from(dir);
        }
        config.backups = std::env::var("ACDB_BACKUPS")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "FALSE" | "False"))
            .unwrap_or(true);
        config
    }

    /// Points the config at another workspace. Output, rules and split directories follow
    /// the new root; run flags are kept.
    pub fn with_workspace_root(self, root: impl Into<PathBuf>) -> Self {
        Self {
            include_batches: self.include_batches,
            dry_run: self.dry_run,
            backups: self.backups,
            apply_renames: self.apply_renames,
            split_after_merge: self.split_after_merge,
            ..Self::for_root(root)
        }
    }

    /// Moves outputs, and the split directory with them, to `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self.split_dir = self.output_dir.join(SPLIT_DIR);
        self
    }

    pub fn bucket_path(&self, bucket: Bucket) -> PathBuf {
        self.output_dir.join(bucket.file_name())
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.bucket_path(Bucket::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_default_to_workspace_root() {
        let config = ReconcileConfig::for_root("/tmp/db");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/db"));
        assert_eq!(config.canonical_path(), PathBuf::from("/tmp/db/ai-character-db.json"));
        assert_eq!(config.rules_dir, PathBuf::from("/tmp/db/rules"));
        assert!(config.backups);
        assert!(!config.dry_run);
    }

    #[test]
    fn output_dir_moves_split_dir() {
        let config = ReconcileConfig::for_root("/tmp/db").with_output_dir("/tmp/out");
        assert_eq!(config.split_dir, PathBuf::from("/tmp/out/data"));
        assert_eq!(
            config.bucket_path(Bucket::Duplicate),
            PathBuf::from("/tmp/out/duplicate-entries.json")
        );
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/db"));
    }

    #[test]
    fn rerooting_keeps_flags() {
        let mut config = ReconcileConfig::for_root("/tmp/db").with_output_dir("/tmp/out");
        config.backups = false;
        config.include_batches = true;
        let config = config.with_workspace_root("/srv/acdb");
        assert_eq!(config.output_dir, PathBuf::from("/srv/acdb"));
        assert_eq!(config.rules_dir, PathBuf::from("/srv/acdb/rules"));
        assert!(!config.backups);
        assert!(config.include_batches);
    }
}
