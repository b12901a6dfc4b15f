//! Builds `update.zip` and `manifest.json` for publishing.

use crate::libs::config::Config;
use crate::libs::manifest::{Manifest, DEFAULT_MANIFEST_NAME, DEFAULT_PACKAGE_NAME};
use crate::libs::messages::Message;
use crate::libs::release::{ReleaseBuilder, ReleaseOptions};
use crate::{msg_bail_anyhow, msg_info, msg_success};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Packaged application folder
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,
    /// Release version tag, e.g. v1.4.1
    #[arg(short, long)]
    version: String,
    /// Output folder
    #[arg(short, long, value_name = "DIR", default_value = "release_out")]
    out: PathBuf,
    /// Ship the shared runtime directory as well
    #[arg(long)]
    include_internal: bool,
    /// Previous release's manifest; builds a delta release
    #[arg(long, value_name = "FILE")]
    prev_manifest: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_PACKAGE_NAME)]
    zip_name: String,
    #[arg(long, default_value = DEFAULT_MANIFEST_NAME)]
    manifest_name: String,
}

pub fn cmd(args: ReleaseArgs) -> Result<()> {
    if !args.input.is_dir() {
        msg_bail_anyhow!(Message::InputDirNotFound(args.input.display().to_string()));
    }
    let previous = match &args.prev_manifest {
        Some(path) if !path.is_file() => msg_bail_anyhow!(Message::ManifestFileNotFound(path.display().to_string())),
        Some(path) => Some(Manifest::load(path)?),
        None => None,
    };

    let config = Config::read().unwrap_or_default();
    let options = ReleaseOptions {
        include_internal: args.include_internal,
        shared_runtime_dir: config.shared_runtime_dir,
        zip_name: args.zip_name,
        manifest_name: args.manifest_name,
        previous,
        ..ReleaseOptions::new(&args.version)
    };
    let delta = options.previous.is_some();

    let artifacts = ReleaseBuilder::new(&args.input, options).build(&args.out)?;

    msg_success!(Message::ReleaseBuilt {
        package: artifacts.package.display().to_string(),
        manifest: artifacts.manifest.display().to_string(),
    });
    msg_info!(Message::ReleaseSummary {
        packed: artifacts.packed,
        deleted: artifacts.deleted,
        delta,
    });
    Ok(())
}
