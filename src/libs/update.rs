//! Update orchestration.
//!
//! One cycle:
//!
//! 1. fetch the latest release, stop if its tag is not newer than ours
//! 2. download and validate the manifest
//! 3. diff the manifest against the install root by content hash
//! 4. plan immediate vs deferred work (refusing deferred work when the
//!    packaged executable is not what is running)
//! 5. stop the bypass binary if its directory is touched
//! 6. download the package, extract only the changed entries into staging,
//!    verify their digests
//! 7. delete obsolete files, copy immediate files into place
//! 8. spawn the handoff for deferred work, or clean up staging; the
//!    downloaded manifest and package are removed either way
//!
//! Steps 1-6 only write into the work area, so any failure up to that
//! point leaves the install root exactly as it was.

use crate::libs::apply::{Applier, ApplyPlan, ApplyState, DeferralRules};
use crate::libs::cancel::CancelToken;
use crate::libs::diff::ChangeSet;
use crate::libs::error::{Result, UpdateError};
use crate::libs::extract::extract_needed;
use crate::libs::fetch::ReleaseSource;
use crate::libs::handoff::{DetachedLauncher, HandoffPlan, Launcher};
use crate::libs::hasher::sha256_file;
use crate::libs::manifest::Manifest;
use crate::libs::paths::RelPath;
use crate::libs::version;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Callbacks a host provides to an update cycle.
///
/// `report_progress` and `persist_last_seen_tag` run inline on the cycle's
/// task and must return quickly.
#[async_trait]
pub trait UpdateHooks: Send + Sync {
    /// Halt the external binary before files it may hold open are touched.
    async fn stop_running_binary(&self) {}

    fn report_progress(&self, _label: &str, _percent: u8) {}

    /// Failures are logged and ignored by the updater.
    fn persist_last_seen_tag(&self, _tag: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
pub struct NoopHooks;

#[async_trait]
impl UpdateHooks for NoopHooks {}

/// Runtime parameters of the updater, resolved once by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterSettings {
    pub current_version: String,
    pub install_root: PathBuf,
    /// Private temp namespace for the manifest, package and staging tree.
    pub work_dir: PathBuf,
    pub manifest_asset: String,
    /// Used when the manifest does not name its package.
    pub package_asset: String,
    pub exe_name: String,
    /// Whether the running program is the packaged executable that a
    /// handoff can wait for and relaunch.
    pub packaged: bool,
    /// Deferred shared runtime subtree, `None` when disabled.
    pub shared_runtime_dir: Option<String>,
    /// Subtree owned by the external bypass binary.
    pub binary_dir: String,
}

impl UpdaterSettings {
    pub fn deferral_rules(&self) -> DeferralRules {
        DeferralRules::new(&self.exe_name, self.shared_runtime_dir.as_deref())
    }

    pub fn work_area(&self) -> WorkArea {
        WorkArea::new(&self.work_dir)
    }
}

/// Files the updater owns inside its temp namespace.
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn package_path(&self) -> PathBuf {
        self.root.join("update.zip")
    }

    pub fn stage_dir(&self) -> PathBuf {
        self.root.join("stage")
    }

    /// Creates the work area and drops a stale staging tree.
    fn prepare(&self) -> Result<()> {
        let stage = self.stage_dir();
        if stage.exists() {
            if let Err(e) = fs::remove_dir_all(&stage) {
                tracing::warn!(path = %stage.display(), error = %e, "could not remove stale staging directory");
            }
        }
        fs::create_dir_all(&self.root).map_err(|e| UpdateError::io(&self.root, e))
    }

    /// Removes the downloaded manifest and package, keeping staging.
    fn discard_downloads(&self) {
        Self::remove_all(&[self.manifest_path(), self.package_path()]);
    }

    fn cleanup(&self) {
        Self::remove_all(&[self.stage_dir(), self.manifest_path(), self.package_path()]);
    }

    fn remove_all(paths: &[PathBuf]) {
        for path in paths {
            let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
            if let Err(e) = result {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "cleanup failed");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The release index has no tag.
    NoRelease,
    UpToDate,
    /// The release does not publish the manifest asset.
    AssetsMissing,
    /// Newer tag, but the install root already matches the manifest.
    NothingToDo,
    Applied,
    /// Deferred work was handed off; the host must exit.
    RestartRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub outcome: Outcome,
    pub updated_any: bool,
    pub restart_required: bool,
    /// Every path written, deleted or handed off, in apply order.
    pub changed_paths: Vec<String>,
    pub new_version: String,
}

impl UpdateResult {
    fn idle(outcome: Outcome, tag: &str) -> Self {
        Self {
            outcome,
            updated_any: false,
            restart_required: false,
            changed_paths: Vec::new(),
            new_version: tag.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    NoRelease,
    UpToDate { tag: String },
    AssetsMissing { tag: String, assets: Vec<String> },
    Available { tag: String, changelog: String },
}

pub struct Updater<S: ReleaseSource> {
    source: S,
    settings: UpdaterSettings,
    launcher: Box<dyn Launcher>,
    cycle: Mutex<()>,
}

impl<S: ReleaseSource> Updater<S> {
    pub fn new(source: S, settings: UpdaterSettings) -> Self {
        Self {
            source,
            settings,
            launcher: Box::new(DetachedLauncher),
            cycle: Mutex::new(()),
        }
    }

    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn settings(&self) -> &UpdaterSettings {
        &self.settings
    }

    /// Looks at the latest release without downloading anything else.
    pub async fn check(&self) -> Result<CheckOutcome> {
        let release = self.source.latest_release().await?;
        if release.tag.is_empty() {
            return Ok(CheckOutcome::NoRelease);
        }
        if !version::is_newer(&release.tag, &self.settings.current_version) {
            return Ok(CheckOutcome::UpToDate { tag: release.tag });
        }
        if release.find_asset(&self.settings.manifest_asset).is_none() {
            return Ok(CheckOutcome::AssetsMissing {
                assets: release.asset_names().into_iter().map(str::to_string).collect(),
                tag: release.tag,
            });
        }
        Ok(CheckOutcome::Available {
            tag: release.tag,
            changelog: release.body,
        })
    }

    /// Runs one full cycle, waiting for any cycle already in flight.
    pub async fn run(&self, hooks: &dyn UpdateHooks, cancel: &CancelToken) -> Result<UpdateResult> {
        let _guard = self.cycle.lock().await;
        self.run_locked(hooks, cancel).await
    }

    /// Like [`Updater::run`], but fails with [`UpdateError::Busy`] instead of
    /// waiting.
    pub async fn try_run(&self, hooks: &dyn UpdateHooks, cancel: &CancelToken) -> Result<UpdateResult> {
        let _guard = self.cycle.try_lock().map_err(|_| UpdateError::Busy)?;
        self.run_locked(hooks, cancel).await
    }

    async fn run_locked(&self, hooks: &dyn UpdateHooks, cancel: &CancelToken) -> Result<UpdateResult> {
        let work = self.settings.work_area();
        match self.cycle(hooks, cancel, &work).await {
            Ok(result) => {
                tracing::info!(outcome = ?result.outcome, tag = %result.new_version, changed = result.changed_paths.len(), "update cycle finished");
                hooks.report_progress(outcome_label(result.outcome), 100);
                Ok(result)
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind(), "update cycle failed");
                work.cleanup();
                Err(e)
            }
        }
    }

    async fn cycle(&self, hooks: &dyn UpdateHooks, cancel: &CancelToken, work: &WorkArea) -> Result<UpdateResult> {
        let settings = &self.settings;
        let progress = |label: &str, percent: u8| hooks.report_progress(label, percent);

        cancel.check()?;
        let release = self.source.latest_release().await?;
        let tag = release.tag.clone();
        if tag.is_empty() {
            tracing::info!("release index carries no tag");
            return Ok(UpdateResult::idle(Outcome::NoRelease, ""));
        }

        if !version::is_newer(&tag, &settings.current_version) {
            tracing::info!(tag = %tag, current = %settings.current_version, "up to date");
            record_tag(hooks, &tag);
            return Ok(UpdateResult::idle(Outcome::UpToDate, &tag));
        }

        let Some(manifest_asset) = release.find_asset(&settings.manifest_asset) else {
            tracing::warn!(tag = %tag, asset = %settings.manifest_asset, assets = ?release.asset_names(), "release has no manifest");
            return Ok(UpdateResult::idle(Outcome::AssetsMissing, &tag));
        };

        work.prepare()?;
        cancel.check()?;
        let manifest_path = work.manifest_path();
        self.source
            .download(&manifest_asset.url, &manifest_path, &settings.manifest_asset, &progress)
            .await?;
        let manifest = Manifest::load(&manifest_path)?;

        cancel.check()?;
        let changes = compute_changes(&manifest, &settings.install_root).await?;
        if changes.is_empty() {
            tracing::info!(tag = %tag, "install root already matches the manifest");
            record_tag(hooks, &tag);
            work.cleanup();
            return Ok(UpdateResult::idle(Outcome::NothingToDo, &tag));
        }
        tracing::info!(changed = changes.changed.len(), deletions = changes.deletions.len(), "changes detected");

        let plan = ApplyPlan::classify(&changes, &settings.deferral_rules());
        let stage_dir = work.stage_dir();
        let handoff = if plan.needs_handoff() {
            Some(HandoffPlan::new(
                settings.packaged,
                &settings.install_root,
                &stage_dir,
                work.root(),
                &settings.exe_name,
                plan.deferred.clone(),
                plan.deferred_deletions.clone(),
            )?)
        } else {
            None
        };

        if changes.touches_dir(&settings.binary_dir) {
            tracing::info!(dir = %settings.binary_dir, "stopping running binary before update");
            hooks.stop_running_binary().await;
        }

        if !changes.changed.is_empty() {
            let package_name = manifest.package.as_deref().unwrap_or(&settings.package_asset);
            let package_asset = release
                .find_asset(package_name)
                .ok_or_else(|| UpdateError::Integrity(format!("release {} does not publish {}", tag, package_name)))?;

            cancel.check()?;
            let package_path = work.package_path();
            self.source.download(&package_asset.url, &package_path, package_name, &progress).await?;

            cancel.check()?;
            stage_changes(&manifest, &changes.changed, &package_path, &stage_dir).await?;
        }

        cancel.check()?;
        let mut applier = Applier::new(&settings.install_root, &stage_dir);
        let outcome = applier.commit(&plan, handoff.as_ref().map(|h| (h, self.launcher.as_ref())), &progress, cancel)?;

        let restart_required = outcome.state == ApplyState::HandoffSpawned;
        if restart_required {
            work.discard_downloads();
        } else {
            work.cleanup();
        }
        record_tag(hooks, &tag);

        let mut changed_paths: Vec<String> = outcome.deleted.iter().chain(outcome.applied.iter()).map(RelPath::to_string).collect();
        if let Some(handoff) = &handoff {
            changed_paths.extend(handoff.deletions().iter().chain(handoff.copies()).map(RelPath::to_string));
        }

        Ok(UpdateResult {
            outcome: if restart_required { Outcome::RestartRequired } else { Outcome::Applied },
            updated_any: !changed_paths.is_empty(),
            restart_required,
            changed_paths,
            new_version: tag,
        })
    }
}

/// Human-readable label for the final progress report.
pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::NoRelease => "no release published",
        Outcome::UpToDate => "up to date",
        Outcome::AssetsMissing => "release assets missing",
        Outcome::NothingToDo => "nothing to update",
        Outcome::Applied => "update applied",
        Outcome::RestartRequired => "restart required",
    }
}

fn record_tag(hooks: &dyn UpdateHooks, tag: &str) {
    if let Err(e) = hooks.persist_last_seen_tag(tag) {
        tracing::warn!(tag, error = %e, "could not persist last seen tag");
    }
}

/// Hashing is blocking I/O; keep it off the async worker.
async fn compute_changes(manifest: &Manifest, install_root: &Path) -> Result<ChangeSet> {
    let manifest = manifest.clone();
    let root = install_root.to_path_buf();
    tokio::task::spawn_blocking(move || ChangeSet::compute(&manifest, &root))
        .await
        .map_err(|e| UpdateError::io(install_root, io::Error::other(e)))
}

async fn stage_changes(manifest: &Manifest, changed: &[RelPath], package: &Path, stage_dir: &Path) -> Result<()> {
    let expected: HashMap<RelPath, String> = manifest.files.iter().map(|f| (f.path.clone(), f.sha256.clone())).collect();
    let changed = changed.to_vec();
    let package = package.to_path_buf();
    let stage = stage_dir.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        extract_needed(&package, &changed, &stage)?;
        for rel in &changed {
            let staged = rel.to_native(&stage);
            let digest = sha256_file(&staged)?;
            if expected.get(rel).is_some_and(|want| !want.eq_ignore_ascii_case(&digest)) {
                return Err(UpdateError::Integrity(format!("{} does not match its manifest digest", rel)));
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| UpdateError::io(stage_dir, io::Error::other(e)))?
}
