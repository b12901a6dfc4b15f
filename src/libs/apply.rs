//! Committing staged files to the install root.
//!
//! Changed and deleted paths are split into *immediate* work, done here
//! while the application keeps running, and *deferred* work (the
//! executable itself and, optionally, the shared runtime directory) that a
//! handoff script performs after the process exits.
//!
//! ```text
//!   Planning ──▶ ApplyingImmediate ──┬──▶ Done
//!                                    └──▶ HandoffSpawned
//! ```

use crate::libs::cancel::CancelToken;
use crate::libs::diff::ChangeSet;
use crate::libs::error::{Result, UpdateError};
use crate::libs::handoff::{HandoffPlan, Launcher};
use crate::libs::paths::RelPath;
use crate::libs::progress::{step_percent, ProgressFn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    Planning,
    ApplyingImmediate,
    Done,
    HandoffSpawned,
}

/// Decides which paths are locked by the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferralRules {
    pub exe_name: String,
    /// Shared runtime subtree (e.g. `_internal`), `None` when deferral of
    /// the runtime is disabled.
    pub shared_runtime_dir: Option<String>,
}

impl DeferralRules {
    pub fn new(exe_name: &str, shared_runtime_dir: Option<&str>) -> Self {
        Self {
            exe_name: exe_name.to_string(),
            shared_runtime_dir: shared_runtime_dir.map(str::to_string).filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn is_deferred(&self, path: &RelPath) -> bool {
        if path.file_name().eq_ignore_ascii_case(&self.exe_name) {
            return true;
        }
        self.shared_runtime_dir.as_deref().is_some_and(|dir| path.is_within(dir))
    }
}

/// Change set split by deferral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub immediate: Vec<RelPath>,
    pub deferred: Vec<RelPath>,
    pub immediate_deletions: Vec<RelPath>,
    pub deferred_deletions: Vec<RelPath>,
}

impl ApplyPlan {
    pub fn classify(changes: &ChangeSet, rules: &DeferralRules) -> Self {
        let (deferred, immediate): (Vec<_>, Vec<_>) = changes.changed.iter().cloned().partition(|p| rules.is_deferred(p));
        let (deferred_deletions, immediate_deletions): (Vec<_>, Vec<_>) = changes.deletions.iter().cloned().partition(|p| rules.is_deferred(p));
        Self {
            immediate,
            deferred,
            immediate_deletions,
            deferred_deletions,
        }
    }

    pub fn needs_handoff(&self) -> bool {
        !self.deferred.is_empty() || !self.deferred_deletions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub state: ApplyState,
    pub applied: Vec<RelPath>,
    pub deleted: Vec<RelPath>,
    pub handoff_script: Option<PathBuf>,
}

pub struct Applier<'a> {
    install_root: &'a Path,
    stage_dir: &'a Path,
    state: ApplyState,
}

impl<'a> Applier<'a> {
    pub fn new(install_root: &'a Path, stage_dir: &'a Path) -> Self {
        Self {
            install_root,
            stage_dir,
            state: ApplyState::Planning,
        }
    }

    /// Runs immediate deletions, then immediate copies, then hands deferred
    /// work to `handoff` if there is any.
    ///
    /// A failing copy aborts the remaining immediate copies; files copied
    /// before it stay in place.
    pub fn commit(
        &mut self,
        plan: &ApplyPlan,
        handoff: Option<(&HandoffPlan, &dyn Launcher)>,
        progress: ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<ApplyOutcome> {
        if plan.needs_handoff() && handoff.is_none() {
            return Err(UpdateError::Configuration("deferred changes present but no handoff was prepared".into()));
        }

        self.state = ApplyState::ApplyingImmediate;
        let deleted = self.delete_immediate(&plan.immediate_deletions);
        let applied = self.copy_immediate(&plan.immediate, progress, cancel)?;

        let mut handoff_script = None;
        match handoff {
            Some((handoff, launcher)) if plan.needs_handoff() => {
                let script = handoff.write_script()?;
                launcher.launch(&script, handoff.flavor()).map_err(|e| UpdateError::io(&script, e))?;
                tracing::info!(script = %script.display(), deferred = plan.deferred.len(), "handoff spawned");
                handoff_script = Some(script);
                self.state = ApplyState::HandoffSpawned;
            }
            _ => self.state = ApplyState::Done,
        }

        Ok(ApplyOutcome {
            state: self.state,
            applied,
            deleted,
            handoff_script,
        })
    }

    /// Best-effort removal; failures are logged and skipped.
    pub fn delete_immediate(&self, paths: &[RelPath]) -> Vec<RelPath> {
        let mut removed = Vec::new();
        for rel in paths {
            let target = rel.to_native(self.install_root);
            match remove_path(&target) {
                Ok(()) => removed.push(rel.clone()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %rel, error = %e, "could not delete obsolete path"),
            }
        }
        removed
    }

    pub fn copy_immediate(&self, paths: &[RelPath], progress: ProgressFn<'_>, cancel: &CancelToken) -> Result<Vec<RelPath>> {
        let mut applied = Vec::with_capacity(paths.len());
        for (i, rel) in paths.iter().enumerate() {
            cancel.check()?;
            progress(&format!("apply: {}", rel), step_percent(i + 1, paths.len()));

            let src = rel.to_native(self.stage_dir);
            if !src.is_file() {
                return Err(UpdateError::Integrity(format!("staged file missing: {}", rel)));
            }
            let dst = rel.to_native(self.install_root);
            atomic_copy_replace(&src, &dst).map_err(|source| UpdateError::Apply {
                path: rel.to_string(),
                source,
            })?;
            applied.push(rel.clone());
        }
        Ok(applied)
    }
}

/// Copies `src` over `dst` without ever exposing a partially written `dst`:
/// the bytes go to a temporary sibling that is renamed over the
/// destination, and the sibling is removed on every failure path.
pub fn atomic_copy_replace(src: &Path, dst: &Path) -> io::Result<()> {
    let dir = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut input = File::open(src)?;
    let mut temp = tempfile::Builder::new().prefix(".mvz-").suffix(".tmp").tempfile_in(dir)?;
    io::copy(&mut input, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    copy_permissions(src, &temp)?;

    temp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

fn copy_permissions(src: &Path, temp: &NamedTempFile) -> io::Result<()> {
    let permissions = fs::metadata(src)?.permissions();
    fs::set_permissions(temp.path(), permissions)
}

fn remove_path(target: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(target)?;
    if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    }
}
