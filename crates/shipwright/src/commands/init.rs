//! Initialize command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use shipwright_config::write_default_config;

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,
}

/// Runs the init command.
pub fn run(args: &InitArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let path = write_default_config(&cwd, args.force).context("failed to write configuration")?;
    println!("Created {}", path.display());
    Ok(ExitCode::SUCCESS)
}
