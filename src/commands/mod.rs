pub mod check;
pub mod hash;
pub mod init;
pub mod plan;
pub mod release;
pub mod update;

use crate::libs::config::Config;
use crate::libs::fetch::GithubSource;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Check whether a newer release is published")]
    Check(check::CheckArgs),
    #[command(about = "Download and apply the latest release")]
    Update(update::UpdateArgs),
    #[command(about = "Show what a manifest would change, without touching anything")]
    Plan(plan::PlanArgs),
    #[command(about = "Print SHA-256 digests of files", arg_required_else_help = true)]
    Hash(hash::HashArgs),
    #[command(about = "Build release assets from a packaged application folder")]
    Release(release::ReleaseArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::Check(args) => check::cmd(args).await,
            Commands::Update(args) => update::cmd(args).await,
            Commands::Plan(args) => plan::cmd(args).await,
            Commands::Hash(args) => hash::cmd(args),
            Commands::Release(args) => release::cmd(args),
        }
    }
}

/// Release source for the repository named in the configuration.
pub(crate) fn github_source(config: &Config) -> Result<GithubSource> {
    let source = GithubSource::new(&config.owner, &config.repo, &config.user_agent)?.timeouts(config.request_timeout(), config.download_timeout());
    Ok(source)
}
