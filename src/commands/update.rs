//! Full update cycle with console progress.

use super::github_source;
use crate::libs::cancel::CancelToken;
use crate::libs::config::Config;
use crate::libs::data_storage::DataStorage;
use crate::libs::error::UpdateError;
use crate::libs::fetch::{LocalSource, ReleaseSource};
use crate::libs::messages::Message;
use crate::libs::process::{BinaryStopper, ProcessLookup};
use crate::libs::state::StatePersistence;
use crate::libs::update::{Outcome, UpdateHooks, UpdateResult, Updater};
use crate::libs::view::View;
use crate::{msg_error_anyhow, msg_info, msg_print, msg_success, msg_warning};
use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Apply a release folder built by `release` instead of the published release
    #[arg(long, value_name = "DIR")]
    from_dir: Option<PathBuf>,
    /// Install root to update (defaults to the configured one)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,
    /// Treat the installation as this version
    #[arg(long, value_name = "VERSION")]
    current_version: Option<String>,
    /// Do not stop the bypass process even if its files change
    #[arg(long)]
    no_stop: bool,
}

/// Hooks wiring the cycle to the console, the process table and the state
/// file.
pub struct CliHooks {
    lookup: ProcessLookup,
    bypass_process: String,
    stop_enabled: bool,
    state: StatePersistence,
    last_progress: Mutex<Option<(String, u8)>>,
}

impl CliHooks {
    pub fn new(config: &Config, stop_enabled: bool, storage: DataStorage) -> Self {
        Self {
            lookup: ProcessLookup::new(config.process_cache_ttl()),
            bypass_process: config.bypass_process.clone(),
            stop_enabled,
            state: StatePersistence::new(storage),
            last_progress: Mutex::new(None),
        }
    }
}

#[async_trait]
impl UpdateHooks for CliHooks {
    async fn stop_running_binary(&self) {
        if !self.stop_enabled || !self.lookup.is_running(&self.bypass_process) {
            return;
        }
        if BinaryStopper::new(&self.lookup, &self.bypass_process).stop().await {
            msg_info!(Message::BinaryStopped(self.bypass_process.clone()));
        } else {
            msg_warning!(Message::BinaryStillRunning(self.bypass_process.clone()));
        }
    }

    /// Prints a line per label at 0%, every 10% step and 100%.
    fn report_progress(&self, label: &str, percent: u8) {
        let mut last = self.last_progress.lock();
        let show = match last.as_ref() {
            Some((prev_label, prev)) if prev_label == label => percent == 100 || percent / 10 > prev / 10,
            _ => true,
        };
        if show {
            msg_print!(Message::Progress(label.to_string(), percent));
            *last = Some((label.to_string(), percent));
        }
    }

    fn persist_last_seen_tag(&self, tag: &str) -> io::Result<()> {
        self.state.record(tag)
    }
}

pub async fn cmd(args: UpdateArgs) -> Result<()> {
    let mut config = Config::read()?;
    if let Some(root) = args.root {
        config.install_root = Some(root);
    }
    if let Some(version) = args.current_version {
        config.current_version = Some(version);
    }
    let settings = config.settings()?;
    let hooks = CliHooks::new(&config, !args.no_stop, DataStorage::new());

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match args.from_dir {
        Some(dir) => {
            msg_info!(Message::CheckingForUpdates(dir.display().to_string()));
            run(Updater::new(LocalSource::new(dir, &config.manifest_asset), settings), &hooks, &cancel).await
        }
        None => {
            let source = github_source(&config)?;
            msg_info!(Message::CheckingForUpdates(source.index_url().to_string()));
            run(Updater::new(source, settings), &hooks, &cancel).await
        }
    };

    match result {
        Ok(result) => {
            report(&result, &config.exe_name);
            Ok(())
        }
        Err(UpdateError::Cancelled) => {
            msg_warning!(Message::UpdateCancelled);
            Ok(())
        }
        Err(UpdateError::Busy) => Err(msg_error_anyhow!(Message::UpdateBusy)),
        Err(e) => Err(msg_error_anyhow!(Message::UpdateFailed(e.to_string()))),
    }
}

async fn run<S: ReleaseSource>(updater: Updater<S>, hooks: &CliHooks, cancel: &CancelToken) -> Result<UpdateResult, UpdateError> {
    updater.run(hooks, cancel).await
}

fn report(result: &UpdateResult, exe_name: &str) {
    match result.outcome {
        Outcome::NoRelease => msg_info!(Message::NoReleasePublished),
        Outcome::UpToDate => msg_success!(Message::UpToDate(result.new_version.clone())),
        Outcome::AssetsMissing => msg_warning!(Message::ReleaseAssetsMissing {
            tag: result.new_version.clone(),
            assets: Vec::new(),
        }),
        Outcome::NothingToDo => msg_success!(Message::NothingToUpdate(result.new_version.clone())),
        Outcome::Applied | Outcome::RestartRequired => {
            msg_success!(Message::UpdateApplied {
                version: result.new_version.clone(),
                files: result.changed_paths.len(),
            });
            if !result.changed_paths.is_empty() {
                msg_print!(Message::ChangedPathsHeader);
                View::changed_paths(&result.changed_paths);
            }
            if result.restart_required {
                msg_warning!(Message::RestartRequired(exe_name.to_string()), true);
            }
        }
    }
}
