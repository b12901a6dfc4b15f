//! # MVZ Updater
//!
//! Manifest-driven patch engine for the MVZ application bundle.
//!
//! A release publishes a manifest listing the SHA-256 digest of every file
//! in the installation plus an archive holding the payloads. The updater
//! diffs the manifest against the install root by content, downloads the
//! archive, extracts only the entries that differ into a staging directory,
//! and commits them. Files the running application holds open (its own
//! executable and, optionally, the shared runtime directory) are replaced
//! by a detached handoff script after the application exits.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mvz_updater::libs::cancel::CancelToken;
//! use mvz_updater::libs::config::Config;
//! use mvz_updater::libs::fetch::GithubSource;
//! use mvz_updater::libs::update::{NoopHooks, Updater};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::read()?;
//! let source = GithubSource::new(&config.owner, &config.repo, &config.user_agent)?;
//! let updater = Updater::new(source, config.settings()?);
//! let result = updater.run(&NoopHooks, &CancelToken::new()).await?;
//! if result.restart_required {
//!     std::process::exit(0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod libs;
