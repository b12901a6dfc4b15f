//! Offline dry run of the diff and deferral classification.

use crate::libs::apply::ApplyPlan;
use crate::libs::config::Config;
use crate::libs::diff::ChangeSet;
use crate::libs::manifest::Manifest;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_bail_anyhow, msg_info, msg_print, msg_success};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Manifest file to compare against
    #[arg(short, long, value_name = "FILE")]
    manifest: PathBuf,
    /// Install root to compare (defaults to the configured one)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,
}

pub async fn cmd(args: PlanArgs) -> Result<()> {
    if !args.manifest.is_file() {
        msg_bail_anyhow!(Message::ManifestFileNotFound(args.manifest.display().to_string()));
    }

    let mut config = Config::read()?;
    if let Some(root) = args.root {
        config.install_root = Some(root);
    }
    let settings = config.settings()?;
    let manifest = Manifest::load(&args.manifest)?;

    let root = settings.install_root.clone();
    let scanned = manifest.clone();
    let changes = tokio::task::spawn_blocking(move || ChangeSet::compute(&scanned, &root)).await?;

    msg_print!(Message::PlanHeader(manifest.version.clone()));
    if changes.is_empty() {
        msg_success!(Message::PlanNoChanges);
        return Ok(());
    }

    let plan = ApplyPlan::classify(&changes, &settings.deferral_rules());
    View::plan(&plan);
    msg_info!(Message::PlanSummary {
        immediate: plan.immediate.len(),
        deferred: plan.deferred.len(),
        deletions: plan.immediate_deletions.len() + plan.deferred_deletions.len(),
    });
    Ok(())
}
