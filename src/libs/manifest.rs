//! Release manifest model.
//!
//! A manifest describes the complete desired state of the installation for
//! one release:
//!
//! ```json
//! {
//!   "version": "v1.4",
//!   "package": "update.zip",
//!   "files": [ {"path": "lists/hosts.txt", "sha256": "<hex64>", "size": 123} ],
//!   "delete": [ "old/file.txt" ]
//! }
//! ```
//!
//! Loading is strict about structure and paths (any unsafe path fails the
//! whole load) but tolerant of individual file entries that lack a path or
//! digest: those are skipped so one damaged entry does not block the rest of
//! the release.

use crate::libs::error::{Result, UpdateError};
use crate::libs::paths::RelPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";
pub const DEFAULT_PACKAGE_NAME: &str = "update.zip";

/// Expected content of one file in the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: RelPath,
    /// Lower-case hex SHA-256.
    pub sha256: String,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    pub package: Option<String>,
    pub files: Vec<FileEntry>,
    pub delete: Vec<RelPath>,
    pub created_utc: Option<String>,
    pub include_internal: bool,
    pub delta: bool,
}

#[derive(Deserialize)]
struct RawFileEntry {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| UpdateError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(root) = root else {
            return Err(UpdateError::Format("root must be an object".into()));
        };

        let files = match root.get("files") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(UpdateError::Format("'files' must be a list".into())),
            None => return Err(UpdateError::Format("missing 'files' list".into())),
        };

        let delete = match root.get("delete") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => return Err(UpdateError::Format("'delete' must be a list".into())),
        };

        let text_field = |key: &str| root.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let flag = |key: &str| root.get(key).and_then(Value::as_bool).unwrap_or(false);

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());
        for item in files {
            let Ok(raw) = serde_json::from_value::<RawFileEntry>(item.clone()) else {
                tracing::warn!(entry = %item, "skipping malformed manifest entry");
                continue;
            };
            let path = raw.path.as_deref().map(str::trim).unwrap_or("");
            let sha256 = raw.sha256.as_deref().map(str::trim).unwrap_or("").to_lowercase();
            if path.is_empty() || sha256.is_empty() {
                tracing::warn!(entry = %item, "skipping manifest entry without path or digest");
                continue;
            }

            let path = RelPath::parse(path)?;
            if seen.insert(path.clone()) {
                entries.push(FileEntry {
                    path,
                    sha256,
                    size: raw.size,
                });
            }
        }

        let mut deletions = Vec::new();
        let mut seen_deletions = HashSet::new();
        for item in delete {
            let Some(raw) = item.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                tracing::warn!(entry = %item, "skipping malformed delete entry");
                continue;
            };
            let path = RelPath::parse(raw)?;
            if let Some(kept) = entries.iter().find(|entry| entry.path.is_within(path.as_str())) {
                tracing::warn!(path = %path, file = %kept.path, "deletion would remove a listed file; keeping the file");
                continue;
            }
            if seen_deletions.insert(path.clone()) {
                deletions.push(path);
            }
        }

        Ok(Manifest {
            version: text_field("version").unwrap_or_default(),
            package: text_field("package"),
            files: entries,
            delete: deletions,
            created_utc: text_field("created_utc"),
            include_internal: flag("include_internal"),
            delta: flag("delta"),
        })
    }

    /// Archive asset to download, falling back to the conventional name.
    pub fn package_name(&self) -> &str {
        self.package.as_deref().unwrap_or(DEFAULT_PACKAGE_NAME)
    }

    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct OutEntry<'a> {
            path: &'a RelPath,
            sha256: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            size: Option<u64>,
        }

        #[derive(Serialize)]
        struct Out<'a> {
            version: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            created_utc: Option<&'a str>,
            package: &'a str,
            include_internal: bool,
            delta: bool,
            files: Vec<OutEntry<'a>>,
            delete: &'a [RelPath],
        }

        let out = Out {
            version: &self.version,
            created_utc: self.created_utc.as_deref(),
            package: self.package_name(),
            include_internal: self.include_internal,
            delta: self.delta,
            files: self
                .files
                .iter()
                .map(|f| OutEntry {
                    path: &f.path,
                    sha256: &f.sha256,
                    size: f.size,
                })
                .collect(),
            delete: &self.delete,
        };

        Ok(serde_json::to_string_pretty(&out)?)
    }
}
