//! Display implementation for updater messages.
//!
//! All user-facing text is defined here, one arm per [`Message`] variant,
//! so wording stays consistent between the check, update, plan and release
//! commands.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigSectionRelease => "Release source".to_string(),
            Message::ConfigSectionInstall => "Installation".to_string(),
            Message::PromptOwner => "GitHub owner".to_string(),
            Message::PromptRepo => "GitHub repository".to_string(),
            Message::PromptCheckInterval => "Hours between automatic checks".to_string(),
            Message::PromptInstallRoot => "Install root (empty: directory of the running executable)".to_string(),
            Message::PromptExeName => "Application executable name".to_string(),
            Message::PromptDeferRuntime(dir) => format!("Replace '{}' only after the application exits?", dir),
            Message::PromptBypassProcess => "Bypass process to stop before updating its files".to_string(),

            // === CHECK MESSAGES ===
            Message::CheckingForUpdates(source) => format!("Checking for updates at {}", source),
            Message::CheckNotDue { last_check, interval_hours } => {
                format!(
                    "Last check was at {}; next check is due {} hours after it (use --force to check now)",
                    last_check, interval_hours
                )
            }
            Message::NoReleasePublished => "No release has been published yet".to_string(),
            Message::UpToDate(tag) => format!("You are using the latest version ({})", tag),
            Message::ReleaseAssetsMissing { tag, assets } => {
                if assets.is_empty() {
                    format!("Release {} has no assets; nothing to update", tag)
                } else {
                    format!("Release {} has no update manifest (assets: {}); nothing to update", tag, assets.join(", "))
                }
            }
            Message::UpdateAvailable { app_name, current, latest } => {
                format!(
                    "A new version is available: {} (installed: {})\nInstall it by running: {} update",
                    latest, current, app_name
                )
            }
            Message::ChangelogHeader => "What's new:".to_string(),

            // === UPDATE MESSAGES ===
            Message::Progress(label, percent) => format!("[{:>3}%] {}", percent, label),
            Message::BinaryStopped(name) => format!("Stopped {} before updating its files", name),
            Message::BinaryStillRunning(name) => format!("{} is still running; its files may be locked", name),
            Message::NothingToUpdate(tag) => format!("Installation already matches release {}", tag),
            Message::UpdateApplied { version, files } => format!("Updated to {} ({} paths changed)", version, files),
            Message::RestartRequired(exe) => {
                format!(
                    "Some files can only be replaced after exit. Close {} now; it will be restarted automatically",
                    exe
                )
            }
            Message::ChangedPathsHeader => "Changed paths:".to_string(),
            Message::UpdateCancelled => "Update cancelled; the installation was not modified further".to_string(),
            Message::UpdateBusy => "Another update is already running".to_string(),
            Message::UpdateFailed(error) => format!("Update failed: {}", error),

            // === PLAN MESSAGES ===
            Message::PlanHeader(version) => format!("Update plan for {}", version),
            Message::PlanNoChanges => "No changes: the installation matches the manifest".to_string(),
            Message::PlanSummary {
                immediate,
                deferred,
                deletions,
            } => format!("{} immediate, {} deferred, {} deletions", immediate, deferred, deletions),

            // === RELEASE MESSAGES ===
            Message::ReleaseBuilt { package, manifest } => format!("Release written:\n  {}\n  {}", package, manifest),
            Message::ReleaseSummary { packed, deleted, delta } => {
                let mode = if *delta { "delta" } else { "full" };
                format!("{} release: {} files packed, {} deletions", mode, packed, deleted)
            }

            // === ERROR MESSAGES ===
            Message::ManifestFileNotFound(path) => format!("Manifest not found: {}", path),
            Message::InputDirNotFound(path) => format!("Input directory not found: {}", path),
            Message::FileHashFailed(path, error) => format!("Cannot hash {}: {}", path, error),
        };

        write!(f, "{}", text)
    }
}
