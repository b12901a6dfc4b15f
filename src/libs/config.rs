//! Configuration of the updater host.
//!
//! The configuration is a JSON file in the per-user data directory (see
//! [`DataStorage`]). Every field has a default, so a missing file or a file
//! written by an older build still loads. The engine never reads this file:
//! [`Config::settings`] resolves it once into an [`UpdaterSettings`] value
//! that is threaded through the update cycle.
//!
//! ## File Location
//!
//! - **Windows**: `%LOCALAPPDATA%\MVComplex\mvz\config.json`
//! - **macOS**: `~/Library/Application Support/MVComplex/mvz/config.json`
//! - **Linux**: `~/.local/share/MVComplex/mvz/config.json`

use super::data_storage::DataStorage;
use crate::libs::manifest::{DEFAULT_MANIFEST_NAME, DEFAULT_PACKAGE_NAME};
use crate::libs::messages::Message;
use crate::libs::update::UpdaterSettings;
use crate::msg_print;
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the private temp namespace for downloads and staging.
pub const WORK_DIR_NAME: &str = "mvz-updater";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// GitHub account that publishes releases.
    pub owner: String,
    pub repo: String,
    pub manifest_asset: String,
    /// Package asset used when a manifest does not name one.
    pub package_asset: String,
    pub user_agent: String,

    /// Version of the installed application. Defaults to the version this
    /// binary was built as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    pub exe_name: String,

    /// Defer the shared runtime subtree to the post-exit handoff.
    pub defer_shared_runtime: bool,
    pub shared_runtime_dir: String,
    /// Subtree owned by the external bypass binary; touching it stops
    /// `bypass_process` first.
    pub binary_dir: String,
    pub bypass_process: String,

    /// Install root. Defaults to the running executable's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,

    pub check_interval_hours: u64,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub process_cache_ttl_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            owner: APP_METADATA_OWNER.to_string(),
            repo: APP_METADATA_REPO.to_string(),
            manifest_asset: DEFAULT_MANIFEST_NAME.to_string(),
            package_asset: DEFAULT_PACKAGE_NAME.to_string(),
            user_agent: "MVZ-Updater".to_string(),
            current_version: None,
            exe_name: APP_METADATA_EXE_NAME.to_string(),
            defer_shared_runtime: true,
            shared_runtime_dir: "_internal".to_string(),
            binary_dir: "bin".to_string(),
            bypass_process: "winws.exe".to_string(),
            install_root: None,
            check_interval_hours: 6,
            request_timeout_secs: 10,
            download_timeout_secs: 60,
            process_cache_ttl_ms: 1500,
        }
    }
}

impl Config {
    /// Reads the configuration, falling back to defaults when no file
    /// exists. A file that exists but does not parse is an error.
    pub fn read() -> Result<Config> {
        Self::read_from(&DataStorage::new())
    }

    pub fn read_from(storage: &DataStorage) -> Result<Config> {
        let config_file_path = storage.get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(&config_file_path)?;
        let config: Config = serde_json::from_str(&config_str).with_context(|| format!("parsing {}", config_file_path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&DataStorage::new())
    }

    pub fn save_to(&self, storage: &DataStorage) -> Result<()> {
        let config_file_path = storage.get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Interactive wizard pre-filled with the current values.
    pub fn init() -> Result<Self> {
        let default = Self::read().unwrap_or_default();
        let theme = ColorfulTheme::default();

        msg_print!(Message::ConfigSectionRelease);
        let owner: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptOwner.to_string())
            .default(default.owner.clone())
            .interact_text()?;
        let repo: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptRepo.to_string())
            .default(default.repo.clone())
            .interact_text()?;
        let check_interval_hours: u64 = Input::with_theme(&theme)
            .with_prompt(Message::PromptCheckInterval.to_string())
            .default(default.check_interval_hours)
            .interact_text()?;

        msg_print!(Message::ConfigSectionInstall);
        let install_root: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptInstallRoot.to_string())
            .default(default.install_root.as_deref().map(|p| p.display().to_string()).unwrap_or_default())
            .allow_empty(true)
            .interact_text()?;
        let exe_name: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptExeName.to_string())
            .default(default.exe_name.clone())
            .interact_text()?;
        let defer_shared_runtime = Confirm::with_theme(&theme)
            .with_prompt(Message::PromptDeferRuntime(default.shared_runtime_dir.clone()).to_string())
            .default(default.defer_shared_runtime)
            .interact()?;
        let bypass_process: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptBypassProcess.to_string())
            .default(default.bypass_process.clone())
            .interact_text()?;

        Ok(Config {
            owner,
            repo,
            check_interval_hours,
            install_root: Some(install_root.trim()).filter(|s| !s.is_empty()).map(PathBuf::from),
            exe_name,
            defer_shared_runtime,
            bypass_process,
            ..default
        })
    }

    pub fn current_version(&self) -> &str {
        self.current_version.as_deref().unwrap_or(APP_METADATA_VERSION)
    }

    pub fn check_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.check_interval_hours.min(i64::MAX as u64) as i64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn process_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.process_cache_ttl_ms)
    }

    /// Resolves the runtime view of this configuration. Capabilities that
    /// depend on the environment (install root, packaged context) are
    /// decided here and nowhere else.
    pub fn settings(&self) -> Result<UpdaterSettings> {
        let current_exe = env::current_exe().ok();
        let install_root = match &self.install_root {
            Some(root) => root.clone(),
            None => current_exe
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .context("cannot determine the install root; set install_root in the configuration")?,
        };
        let packaged = current_exe
            .as_deref()
            .is_some_and(|exe| is_packaged(exe, &install_root, &self.exe_name));

        Ok(UpdaterSettings {
            current_version: self.current_version().to_string(),
            install_root,
            work_dir: env::temp_dir().join(WORK_DIR_NAME),
            manifest_asset: self.manifest_asset.clone(),
            package_asset: self.package_asset.clone(),
            exe_name: self.exe_name.clone(),
            packaged,
            shared_runtime_dir: Some(self.shared_runtime_dir.clone()).filter(|_| self.defer_shared_runtime),
            binary_dir: self.binary_dir.clone(),
        })
    }
}

/// The handoff can only wait for and relaunch the application when the
/// running program is the packaged executable inside the install root.
pub fn is_packaged(current_exe: &Path, install_root: &Path, exe_name: &str) -> bool {
    let name_matches = current_exe
        .file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(exe_name));
    let in_root = match (current_exe.parent().map(fs::canonicalize), fs::canonicalize(install_root)) {
        (Some(Ok(dir)), Ok(root)) => dir == root,
        _ => current_exe.parent() == Some(install_root),
    };
    name_matches && in_root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = serde_json::from_str(r#"{"repo": "Other", "check_interval_hours": 12}"#).unwrap();
        assert_eq!(config.repo, "Other");
        assert_eq!(config.check_interval_hours, 12);
        assert_eq!(config.manifest_asset, "manifest.json");
        assert_eq!(config.bypass_process, "winws.exe");
        assert!(config.defer_shared_runtime);
    }

    #[test]
    fn packaged_requires_matching_name_and_root() {
        let root = Path::new("/opt/mvz");
        assert!(is_packaged(Path::new("/opt/mvz/MVZ.exe"), root, "mvz.exe"));
        assert!(!is_packaged(Path::new("/opt/mvz/python"), root, "MVZ.exe"));
        assert!(!is_packaged(Path::new("/usr/bin/MVZ.exe"), root, "MVZ.exe"));
    }

    #[test]
    fn disabled_runtime_deferral_clears_the_dir() {
        let config = Config {
            install_root: Some(PathBuf::from("/opt/mvz")),
            defer_shared_runtime: false,
            ..Config::default()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.shared_runtime_dir, None);
        assert_eq!(settings.install_root, PathBuf::from("/opt/mvz"));
        assert!(!settings.packaged);
    }
}
