//! CLI definition.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Release orchestration for git projects, npm packages and GitHub/GitLab releases.
#[derive(Debug, Parser)]
#[command(name = "shipwright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a default .shipwright.toml
    Init(commands::init::InitArgs),

    /// Run a release: bump, commit, tag, push and publish
    Release(commands::release::ReleaseArgs),
}

impl Cli {
    /// Runs the CLI command.
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Commands::Init(args) => commands::init::run(&args),
            Commands::Release(args) => commands::release::run(args).await,
        }
    }
}
