use crate::libs::hasher::sha256_file;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::msg_error;
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct HashArgs {
    /// Files to hash
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

pub fn cmd(args: HashArgs) -> Result<()> {
    let mut rows = Vec::with_capacity(args.files.len());
    let mut failed = 0;

    for path in &args.files {
        match sha256_file(path) {
            Ok(digest) => rows.push((digest, path.display().to_string())),
            Err(e) => {
                msg_error!(Message::FileHashFailed(path.display().to_string(), e.to_string()));
                failed += 1;
            }
        }
    }

    if !rows.is_empty() {
        View::digests(&rows);
    }
    if failed > 0 {
        bail!("{} of {} files could not be hashed", failed, args.files.len());
    }
    Ok(())
}
