use crate::libs::error::{Result, UpdateError};
use crate::libs::paths::RelPath;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::ZipArchive;

/// Extracts exactly `needed` from the package into `stage_dir`.
///
/// Only the staging directory is written. Every archive entry name is
/// validated, and a requested path the archive does not contain is an
/// integrity error: the manifest and the package disagree, so nothing from
/// this package can be trusted.
pub fn extract_needed(package: &Path, needed: &[RelPath], stage_dir: &Path) -> Result<()> {
    let file = File::open(package).map_err(|e| UpdateError::io(package, e))?;
    let mut archive = ZipArchive::new(file)?;

    let mut index: HashMap<RelPath, String> = HashMap::new();
    for name in archive.file_names() {
        if name.ends_with('/') || name.ends_with('\\') {
            continue;
        }
        index.entry(RelPath::parse(name)?).or_insert_with(|| name.to_string());
    }

    fs::create_dir_all(stage_dir).map_err(|e| UpdateError::io(stage_dir, e))?;

    for rel in needed {
        let Some(name) = index.get(rel) else {
            return Err(UpdateError::Integrity(format!("package is missing {}", rel)));
        };

        let out_path = rel.to_native(stage_dir);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UpdateError::io(parent, e))?;
        }

        let mut entry = archive.by_name(name)?;
        let mut out = File::create(&out_path).map_err(|e| UpdateError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| UpdateError::io(&out_path, e))?;
        tracing::debug!(path = %rel, bytes = entry.size(), "staged");
    }

    Ok(())
}
