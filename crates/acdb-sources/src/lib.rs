//! Source discovery and per-file loading of character entries.

use std::fs;
use std::path::{Path, PathBuf};

use acdb_core::RawEntry;
use anyhow::Context;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const CRATE_NAME: &str = "acdb-sources";

/// Nested tree of additional inputs, scanned only on request.
pub const BATCHES_DIR: &str = "batches";

/// Top-level JSON files that sit next to the sources but never hold characters.
pub const NON_SOURCE_FILES: &[&str] = &["version.json", "package.json", "package-lock.json"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: {detail}", .path.display())]
    Structure { path: PathBuf, detail: String },
}

impl SourceError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Structure { path, .. } => path,
        }
    }
}

/// Contents of one input file. A bare list has no metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDocument {
    pub metadata: Option<Map<String, JsonValue>>,
    pub characters: Vec<RawEntry>,
}

impl SourceDocument {
    pub fn metadata_or_default(&self) -> Map<String, JsonValue> {
        self.metadata.clone().unwrap_or_default()
    }
}

pub fn parse_source_document(path: &Path, text: &str) -> Result<SourceDocument, SourceError> {
    let value: JsonValue = serde_json::from_str(text).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let structure = |detail: &str| SourceError::Structure {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    };

    match value {
        JsonValue::Object(mut map) => {
            let characters = match map.remove("characters") {
                Some(JsonValue::Array(items)) => items,
                Some(_) => return Err(structure("`characters` is not a list")),
                None => return Err(structure("object has no `characters` list")),
            };
            let metadata = match map.remove("metadata") {
                Some(JsonValue::Object(meta)) => Some(meta),
                _ => None,
            };
            Ok(SourceDocument {
                metadata,
                characters: entries_from_items(path, characters)?,
            })
        }
        JsonValue::Array(items) => Ok(SourceDocument {
            metadata: None,
            characters: entries_from_items(path, items)?,
        }),
        _ => Err(structure("expected an object with `characters` or a list of entries")),
    }
}

fn entries_from_items(path: &Path, items: Vec<JsonValue>) -> Result<Vec<RawEntry>, SourceError> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            JsonValue::Object(map) => Ok(RawEntry::from(map)),
            _ => Err(SourceError::Structure {
                path: path.to_path_buf(),
                detail: format!("characters[{idx}] is not an object"),
            }),
        })
        .collect()
}

pub fn load_source_file(path: impl AsRef<Path>) -> Result<SourceDocument, SourceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source_document(path, &text)
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Number of entries taken from the file, or why it was skipped.
    pub result: Result<usize, SourceError>,
}

/// Every entry from every loadable file, flattened in file order, plus one outcome per file.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub entries: Vec<RawEntry>,
    pub outcomes: Vec<FileOutcome>,
}

impl LoadReport {
    pub fn loaded_files(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SourceError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Loads each file in order. Unreadable, unparseable or misshapen files are logged and
/// skipped; the rest still load.
pub fn load_sources(paths: &[PathBuf]) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        let result = match load_source_file(path) {
            Ok(doc) => {
                let count = doc.characters.len();
                debug!(path = %path.display(), entries = count, "loaded source file");
                report.entries.extend(doc.characters);
                Ok(count)
            }
            Err(err) => {
                warn!("skipping source file: {err}");
                Err(err)
            }
        };
        report.outcomes.push(FileOutcome {
            path: path.clone(),
            result,
        });
    }
    report
}

fn is_json_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

fn is_non_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| NON_SOURCE_FILES.contains(&name))
        .unwrap_or(false)
}

/// Top-level `*.json` files under `root`, sorted by path; with `include_batches`, followed
/// by every `*.json` file anywhere below `root/batches`, also sorted.
pub fn discover_source_files(root: &Path, include_batches: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(root)
        .with_context(|| format!("reading {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_json_file(path) && !is_non_source(path))
        .collect::<Vec<_>>();
    files.sort();

    if include_batches {
        let batches = root.join(BATCHES_DIR);
        if batches.is_dir() {
            let mut batch_files = Vec::new();
            for entry in WalkDir::new(&batches).follow_links(false) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_json_file(entry.path()) => {
                        batch_files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(err) => warn!("error walking {}: {err}", batches.display()),
                }
            }
            batch_files.sort();
            tracing::info!(
                "scanning {} found {} additional source files",
                batches.display(),
                batch_files.len()
            );
            files.extend(batch_files);
        } else {
            warn!("batch directory {} does not exist", batches.display());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, text).expect("write fixture");
    }

    #[test]
    fn envelope_and_bare_list_are_both_accepted() {
        let doc = parse_source_document(
            Path::new("a.json"),
            r#"{"metadata": {"source": "wiki"}, "characters": [{"character_name": "HAL 9000"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.characters.len(), 1);
        assert_eq!(doc.metadata.unwrap()["source"], "wiki");

        let doc = parse_source_document(
            Path::new("b.json"),
            r#"[{"character_name": "Data"}, {"character_name": "Lore"}]"#,
        )
        .unwrap();
        assert_eq!(doc.characters.len(), 2);
        assert!(doc.metadata.is_none());
    }

    #[test]
    fn misshapen_documents_are_structure_errors() {
        for text in [
            r#"{"version": "abc123"}"#,
            r#"{"characters": {"character_name": "Data"}}"#,
            r#""just a string""#,
            r#"[{"character_name": "Data"}, 7]"#,
        ] {
            let err = parse_source_document(Path::new("x.json"), text).unwrap_err();
            assert!(matches!(err, SourceError::Structure { .. }), "{text}: {err}");
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_source_document(Path::new("x.json"), "{ not json").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert_eq!(err.path(), Path::new("x.json"));
    }

    #[test]
    fn loading_continues_past_bad_files() {
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("a.json");
        let bad = dir.path().join("b.json");
        let missing = dir.path().join("c.json");
        write(&good, r#"[{"character_name": "Ava"}]"#);
        write(&bad, "{ broken");

        let report = load_sources(&[good, bad, missing]);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.loaded_files(), 1);
        let skipped = report.skipped().collect::<Vec<_>>();
        assert_eq!(skipped.len(), 2);
        assert!(matches!(skipped[0], SourceError::Parse { .. }));
        assert!(matches!(skipped[1], SourceError::Read { .. }));
    }

    #[test]
    fn discovery_is_sorted_and_batches_are_opt_in() {
        let dir = tempdir().expect("tempdir");
        write(&dir.path().join("b.json"), "[]");
        write(&dir.path().join("a.json"), "[]");
        write(&dir.path().join("notes.txt"), "ignored");
        write(&dir.path().join("version.json"), r#"{"version": "abc123"}"#);
        write(&dir.path().join("data").join("movie.json"), "[]");
        write(&dir.path().join("batches").join("2").join("z.json"), "[]");
        write(&dir.path().join("batches").join("1").join("deep").join("y.json"), "[]");

        let top = discover_source_files(dir.path(), false).unwrap();
        assert_eq!(top, vec![dir.path().join("a.json"), dir.path().join("b.json")]);

        let all = discover_source_files(dir.path(), true).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[2], dir.path().join("batches").join("1").join("deep").join("y.json"));
        assert_eq!(all[3], dir.path().join("batches").join("2").join("z.json"));
    }

    #[test]
    fn missing_batches_directory_is_not_fatal() {
        let dir = tempdir().expect("tempdir");
        write(&dir.path().join("a.json"), "[]");
        let files = discover_source_files(dir.path(), true).unwrap();
        assert_eq!(files.len(), 1);
    }
}
