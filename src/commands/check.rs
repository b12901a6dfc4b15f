//! Silent periodic check.
//!
//! Honours `check_interval_hours` so a host can call it on every start
//! without hitting the release index each time.

use super::github_source;
use crate::libs::config::{Config, APP_METADATA_NAME};
use crate::libs::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::libs::state::UpdateState;
use crate::libs::update::{CheckOutcome, Updater};
use crate::{msg_info, msg_print, msg_success, msg_warning};
use anyhow::Result;
use chrono::Utc;
use clap::Args;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Check even if the configured interval has not elapsed
    #[arg(short, long)]
    force: bool,
}

pub async fn cmd(args: CheckArgs) -> Result<()> {
    let config = Config::read()?;
    let storage = DataStorage::new();
    let mut state = UpdateState::read(&storage)?;
    let now = Utc::now();

    if !args.force && !state.is_check_due(config.check_interval(), now) {
        msg_info!(Message::CheckNotDue {
            last_check: state.last_check.clone().unwrap_or_default(),
            interval_hours: config.check_interval_hours,
        });
        return Ok(());
    }

    let source = github_source(&config)?;
    msg_info!(Message::CheckingForUpdates(source.index_url().to_string()));
    let updater = Updater::new(source, config.settings()?);

    let outcome = updater.check().await?;
    match &outcome {
        CheckOutcome::NoRelease => msg_info!(Message::NoReleasePublished),
        CheckOutcome::UpToDate { tag } => msg_success!(Message::UpToDate(tag.clone())),
        CheckOutcome::AssetsMissing { tag, assets } => msg_warning!(Message::ReleaseAssetsMissing {
            tag: tag.clone(),
            assets: assets.clone(),
        }),
        CheckOutcome::Available { tag, changelog } => {
            msg_info!(Message::UpdateAvailable {
                app_name: APP_METADATA_NAME.to_string(),
                current: config.current_version().to_string(),
                latest: tag.clone(),
            });
            if !changelog.trim().is_empty() {
                msg_print!(Message::ChangelogHeader);
                msg_print!(changelog.trim());
            }
        }
    }

    match &outcome {
        CheckOutcome::UpToDate { tag } | CheckOutcome::Available { tag, .. } | CheckOutcome::AssetsMissing { tag, .. } => {
            state.last_seen_tag = Some(tag.clone());
        }
        CheckOutcome::NoRelease => {}
    }
    state.mark_checked(now);
    if let Err(e) = state.save(&storage) {
        tracing::warn!(error = %e, "could not save update state");
    }

    Ok(())
}
