use crate::libs::hasher::sha256_file;
use crate::libs::manifest::Manifest;
use crate::libs::paths::RelPath;
use std::collections::HashSet;
use std::path::Path;

/// Difference between a manifest and the local install root.
///
/// Computed fresh on every check, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files missing locally or whose digest differs from the manifest.
    pub changed: Vec<RelPath>,
    /// Manifest deletions that currently exist locally.
    pub deletions: Vec<RelPath>,
}

impl ChangeSet {
    pub fn compute(manifest: &Manifest, install_root: &Path) -> Self {
        ChangeSet {
            changed: compute_changed(manifest, install_root),
            deletions: compute_deletions(manifest, install_root),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deletions.is_empty()
    }

    /// Every path this change set touches, updates first.
    pub fn touched(&self) -> impl Iterator<Item = &RelPath> {
        self.changed.iter().chain(self.deletions.iter())
    }

    /// True when any touched path lies under `dir` (e.g. `bin`).
    pub fn touches_dir(&self, dir: &str) -> bool {
        self.touched().any(|path| path.is_within(dir))
    }
}

/// Paths whose local copy is absent, unreadable or differs from the
/// manifest digest. Order follows the manifest, duplicates dropped.
pub fn compute_changed(manifest: &Manifest, install_root: &Path) -> Vec<RelPath> {
    let mut seen = HashSet::new();
    let mut changed = Vec::new();

    for entry in &manifest.files {
        if !seen.insert(&entry.path) {
            continue;
        }

        let local = entry.path.to_native(install_root);
        let differs = if !local.is_file() {
            tracing::debug!(path = %entry.path, "missing locally");
            true
        } else {
            match sha256_file(&local) {
                Ok(digest) => !digest.eq_ignore_ascii_case(&entry.sha256),
                Err(e) => {
                    tracing::warn!(path = %entry.path, error = %e, "unreadable local file, treating as changed");
                    true
                }
            }
        };

        if differs {
            changed.push(entry.path.clone());
        }
    }

    changed
}

/// Manifest deletions that exist locally (file or directory).
pub fn compute_deletions(manifest: &Manifest, install_root: &Path) -> Vec<RelPath> {
    let mut seen = HashSet::new();
    manifest
        .delete
        .iter()
        .filter(|path| seen.insert(*path))
        .filter(|path| path.to_native(install_root).symlink_metadata().is_ok())
        .cloned()
        .collect()
}
