//! Builds the two release assets, package and manifest, from a packaged
//! application folder.
//!
//! A full release lists and packs every file. A delta release is built
//! against the previous release's manifest: only files whose digest changed
//! are listed and packed, and files that disappeared are listed under
//! `delete`. Clients diff by content either way, so a delta release only
//! has to be complete relative to the release it was built against.

use crate::libs::error::{Result, UpdateError};
use crate::libs::hasher::sha256_file;
use crate::libs::manifest::{FileEntry, Manifest, DEFAULT_MANIFEST_NAME, DEFAULT_PACKAGE_NAME};
use crate::libs::paths::RelPath;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub version: String,
    pub include_internal: bool,
    pub shared_runtime_dir: String,
    pub zip_name: String,
    pub manifest_name: String,
    /// Previous release's manifest; switches the build to delta mode.
    pub previous: Option<Manifest>,
}

impl ReleaseOptions {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            include_internal: false,
            shared_runtime_dir: "_internal".to_string(),
            zip_name: DEFAULT_PACKAGE_NAME.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            previous: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifacts {
    pub package: PathBuf,
    pub manifest: PathBuf,
    pub packed: usize,
    pub deleted: usize,
}

struct LocalFile {
    abs: PathBuf,
    sha256: String,
    size: u64,
}

pub struct ReleaseBuilder {
    input: PathBuf,
    options: ReleaseOptions,
}

impl ReleaseBuilder {
    pub fn new(input: &Path, options: ReleaseOptions) -> Self {
        Self {
            input: input.to_path_buf(),
            options,
        }
    }

    pub fn build(&self, out_dir: &Path) -> Result<ReleaseArtifacts> {
        let current = self.scan(out_dir)?;
        let delta = self.options.previous.is_some();

        let previous: HashMap<&RelPath, &str> = self
            .options
            .previous
            .iter()
            .flat_map(|m| m.files.iter())
            .map(|f| (&f.path, f.sha256.as_str()))
            .collect();

        let to_pack: Vec<(&RelPath, &LocalFile)> = current
            .iter()
            .filter(|(rel, file)| !delta || !matches!(previous.get(rel), Some(sha) if sha.eq_ignore_ascii_case(&file.sha256)))
            .collect();

        let mut delete: Vec<RelPath> = previous.keys().filter(|rel| !current.contains_key(**rel)).map(|rel| (*rel).clone()).collect();
        delete.sort();

        fs::create_dir_all(out_dir).map_err(|e| UpdateError::io(out_dir, e))?;
        let package = out_dir.join(&self.options.zip_name);
        write_package(&package, &to_pack)?;

        let manifest = Manifest {
            version: self.options.version.clone(),
            package: Some(self.options.zip_name.clone()),
            files: to_pack
                .iter()
                .map(|(rel, file)| FileEntry {
                    path: (*rel).clone(),
                    sha256: file.sha256.clone(),
                    size: Some(file.size),
                })
                .collect(),
            delete,
            created_utc: Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            include_internal: self.options.include_internal,
            delta,
        };
        let manifest_path = out_dir.join(&self.options.manifest_name);
        fs::write(&manifest_path, manifest.to_json()?).map_err(|e| UpdateError::io(&manifest_path, e))?;

        tracing::info!(
            version = %self.options.version,
            packed = manifest.files.len(),
            deleted = manifest.delete.len(),
            delta,
            "release built"
        );

        Ok(ReleaseArtifacts {
            package,
            manifest: manifest_path,
            packed: manifest.files.len(),
            deleted: manifest.delete.len(),
        })
    }

    /// Hashes every shippable file, keyed and ordered by relative path.
    fn scan(&self, out_dir: &Path) -> Result<BTreeMap<RelPath, LocalFile>> {
        let out_dir = fs::canonicalize(out_dir).ok();
        let mut files = BTreeMap::new();

        for entry in WalkDir::new(&self.input).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.input.clone());
                UpdateError::io(path, io::Error::other(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let (Some(out), Ok(abs)) = (&out_dir, fs::canonicalize(entry.path())) {
                if abs.starts_with(out) {
                    continue;
                }
            }

            let Ok(relative) = entry.path().strip_prefix(&self.input) else {
                continue;
            };
            let rel = RelPath::parse(&relative.to_string_lossy())?;
            if self.is_skipped(&rel) {
                tracing::debug!(path = %rel, "not shipped");
                continue;
            }

            let size = entry.metadata().map_err(|e| UpdateError::io(entry.path(), io::Error::other(e)))?.len();
            let sha256 = sha256_file(entry.path())?;
            files.insert(
                rel,
                LocalFile {
                    abs: entry.path().to_path_buf(),
                    sha256,
                    size,
                },
            );
        }

        Ok(files)
    }

    fn is_skipped(&self, rel: &RelPath) -> bool {
        let lower = rel.as_str().to_lowercase();
        if rel.file_name().eq_ignore_ascii_case(DEFAULT_MANIFEST_NAME) {
            return true;
        }
        if lower.ends_with(".log") || lower.ends_with(".tmp") {
            return true;
        }
        if lower.split('/').any(|segment| segment == "__pycache__") {
            return true;
        }
        !self.options.include_internal && rel.is_within(&self.options.shared_runtime_dir)
    }
}

fn write_package(path: &Path, files: &[(&RelPath, &LocalFile)]) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| UpdateError::io(path, e))?;
    }
    let out = File::create(path).map_err(|e| UpdateError::io(path, e))?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated).compression_level(Some(9));

    for (rel, file) in files {
        writer.start_file(rel.as_str(), options)?;
        let mut input = File::open(&file.abs).map_err(|e| UpdateError::io(&file.abs, e))?;
        io::copy(&mut input, &mut writer).map_err(|e| UpdateError::io(&file.abs, e))?;
    }
    writer.finish()?;
    Ok(())
}
