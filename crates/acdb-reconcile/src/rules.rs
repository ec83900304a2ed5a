//! Immutable rule sets loaded from `rules/*.yaml`.

use std::path::Path;

use acdb_core::RawEntry;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::pipeline::EntryHook;

pub const FIELD_RENAMES_FILE: &str = "field_renames.yaml";
pub const WORK_TYPES_FILE: &str = "work_types.yaml";

const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRename {
    pub from: String,
    pub to: String,
}

/// Legacy field names mapped onto the current schema, applied in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRenameRules {
    pub version: u32,
    #[serde(default)]
    pub renames: Vec<FieldRename>,
    #[serde(default)]
    pub drop_fields: Vec<String>,
}

impl Default for FieldRenameRules {
    fn default() -> Self {
        let rename = |from: &str, to: &str| FieldRename {
            from: from.to_string(),
            to: to.to_string(),
        };
        Self {
            version: SUPPORTED_VERSION,
            renames: vec![
                rename("year", "publication_year"),
                rename("work", "work_name"),
                rename("name", "character_name"),
                rename("film", "work_name"),
            ],
            drop_fields: vec!["benevolence_rating_explanation_additional".to_string()],
        }
    }
}

impl FieldRenameRules {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let rules: Self = serde_yaml::from_str(text).context("parsing field rename rules")?;
        check_version(rules.version, FIELD_RENAMES_FILE)?;
        Ok(rules)
    }

    pub fn from_rules_dir(dir: &Path) -> Result<Self> {
        load_or_default(dir, FIELD_RENAMES_FILE, Self::from_yaml_str)
    }

    /// Copies each legacy value into its new name unless the new field already holds
    /// something other than `""`, then removes the legacy and dropped fields.
    pub fn apply(&self, mut entry: RawEntry) -> RawEntry {
        for rule in &self.renames {
            let Some(old) = entry.remove(&rule.from) else {
                continue;
            };
            let target_free = match entry.get(&rule.to) {
                None => true,
                Some(JsonValue::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if target_free {
                entry.insert(rule.to.clone(), old);
            }
        }
        for field in &self.drop_fields {
            entry.remove(field);
        }
        entry
    }
}

/// Runs [`FieldRenameRules`] over every entry before schema validation.
#[derive(Debug, Clone, Default)]
pub struct FieldRenameHook {
    rules: FieldRenameRules,
}

impl FieldRenameHook {
    pub fn new(rules: FieldRenameRules) -> Self {
        Self { rules }
    }
}

impl EntryHook for FieldRenameHook {
    fn apply(&self, entries: Vec<RawEntry>) -> Vec<RawEntry> {
        entries.into_iter().map(|e| self.rules.apply(e)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousWorkType {
    pub work_name: String,
    pub character_name: String,
    pub work_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTypeMapping {
    pub from: String,
    pub to: String,
}

/// Work type clean-up: explicit per-character resolutions, then a plain renaming map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTypeRules {
    pub version: u32,
    #[serde(default)]
    pub ambiguous: Vec<AmbiguousWorkType>,
    #[serde(default)]
    pub mapping: Vec<WorkTypeMapping>,
}

impl Default for WorkTypeRules {
    fn default() -> Self {
        let ambiguous = [
            ("Dragon Ball", "Android 16", "Manga"),
            ("Dragon Ball", "Android 19", "Manga"),
            ("Dragon Ball", "Cell", "Manga"),
            ("Ghost in the Shell", "Puppetmaster", "Manga"),
            ("½ Prince", "Self-Aware NPCs", "Light Novel"),
        ]
        .into_iter()
        .map(|(work_name, character_name, work_type)| AmbiguousWorkType {
            work_name: work_name.to_string(),
            character_name: character_name.to_string(),
            work_type: work_type.to_string(),
        })
        .collect();

        let mapping = [
            ("Film", "Movie"),
            ("Animated Movie", "Movie"),
            ("Anime Movie", "Movie"),
            ("Short Film", "Movie"),
            ("Fanfic", "Fan Fiction"),
            ("Fan Work", "Fan Fiction"),
            ("Web Original", "Web Fiction"),
            ("Web Serial", "Web Fiction"),
            ("Web Serial Novel", "Web Fiction"),
            ("Blog Fiction", "Web Fiction"),
            ("Literature", "Book"),
            ("Book Series", "Book"),
            ("Radio Drama", "Radio"),
            ("Radio Show", "Radio"),
            ("Actual Play Podcast", "Podcast"),
            ("Multimedia Franchise", "Franchise"),
            ("Trading Card Game", "Tabletop Game"),
            ("Forum Roleplay", "Roleplay"),
            ("Fake Gaming News", "Website"),
            ("Rant", "Web Video"),
            ("Animated Short", "Cartoon Short"),
        ]
        .into_iter()
        .map(|(from, to)| WorkTypeMapping {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect();

        Self {
            version: SUPPORTED_VERSION,
            ambiguous,
            mapping,
        }
    }
}

impl WorkTypeRules {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let rules: Self = serde_yaml::from_str(text).context("parsing work type rules")?;
        check_version(rules.version, WORK_TYPES_FILE)?;
        Ok(rules)
    }

    pub fn from_rules_dir(dir: &Path) -> Result<Self> {
        load_or_default(dir, WORK_TYPES_FILE, Self::from_yaml_str)
    }

    pub fn resolution_for(&self, work_name: &str, character_name: &str) -> Option<&str> {
        self.ambiguous
            .iter()
            .find(|r| r.work_name == work_name && r.character_name == character_name)
            .map(|r| r.work_type.as_str())
    }

    pub fn mapped(&self, work_type: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|m| m.from == work_type)
            .map(|m| m.to.as_str())
    }
}

fn check_version(version: u32, file: &str) -> Result<()> {
    if version != SUPPORTED_VERSION {
        bail!("{file}: unsupported rules version {version} (expected {SUPPORTED_VERSION})");
    }
    Ok(())
}

fn load_or_default<T: Default>(
    dir: &Path,
    file: &str,
    parse: fn(&str) -> Result<T>,
) -> Result<T> {
    let path = dir.join(file);
    if !path.exists() {
        debug!(path = %path.display(), "rules file not found, using built-in defaults");
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&text).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn raw(value: JsonValue) -> RawEntry {
        serde_json::from_value(value).expect("raw entry")
    }

    #[test]
    fn legacy_names_move_to_schema_names() {
        let rules = FieldRenameRules::default();
        let fixed = rules.apply(raw(json!({
            "name": "Skynet",
            "film": "The Terminator",
            "year": 1984,
            "benevolence_rating_explanation_additional": "extra",
        })));
        assert_eq!(
            fixed,
            raw(json!({
                "character_name": "Skynet",
                "work_name": "The Terminator",
                "publication_year": 1984,
            }))
        );
    }

    #[test]
    fn rename_never_overwrites_populated_target() {
        let rules = FieldRenameRules::default();
        let fixed = rules.apply(raw(json!({"work": "Dune", "film": "Dune (1984)"})));
        assert_eq!(fixed, raw(json!({"work_name": "Dune"})));

        let fixed = rules.apply(raw(json!({"work_name": "", "work": "Dune"})));
        assert_eq!(fixed, raw(json!({"work_name": "Dune"})));

        let fixed = rules.apply(raw(json!({"work_name": null, "work": "Dune"})));
        assert_eq!(fixed, raw(json!({"work_name": null})));
    }

    #[test]
    fn rules_parse_from_yaml() {
        let rules = FieldRenameRules::from_yaml_str(
            "version: 1\nrenames:\n  - from: title\n    to: work_name\n",
        )
        .unwrap();
        assert_eq!(rules.renames.len(), 1);
        assert!(rules.drop_fields.is_empty());

        assert!(FieldRenameRules::from_yaml_str("version: 2\n").is_err());
    }

    #[test]
    fn missing_rule_files_fall_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(
            FieldRenameRules::from_rules_dir(dir.path()).unwrap(),
            FieldRenameRules::default()
        );
        assert_eq!(
            WorkTypeRules::from_rules_dir(dir.path()).unwrap(),
            WorkTypeRules::default()
        );
    }

    #[test]
    fn work_type_lookups() {
        let rules = WorkTypeRules::default();
        assert_eq!(rules.resolution_for("Dragon Ball", "Cell"), Some("Manga"));
        assert_eq!(rules.resolution_for("Dragon Ball", "Goku"), None);
        assert_eq!(rules.mapped("Film"), Some("Movie"));
        assert_eq!(rules.mapped("Movie"), None);
    }

    #[test]
    fn shipped_rule_files_match_defaults() {
        let rules_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../rules");
        assert_eq!(
            FieldRenameRules::from_rules_dir(&rules_dir).unwrap(),
            FieldRenameRules::default()
        );
        assert_eq!(
            WorkTypeRules::from_rules_dir(&rules_dir).unwrap(),
            WorkTypeRules::default()
        );
    }
}
