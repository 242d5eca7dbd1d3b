//! Release command.

use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value, json};
use shipwright_config::{Config, find_config_file_from, read_layer, resolve_config};
use shipwright_core::{Orchestrator, ProcessShell, ReleaseRecord};
use shipwright_plugin::Services;
use tracing::{info, warn};

use crate::plugins::builtin_registry;
use crate::prompt::TerminalPrompt;

/// Exit code after an interrupt.
const INTERRUPTED: u8 = 130;

/// Arguments for the release command.
#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Release type (patch, minor, major, pre*) or an explicit version
    #[arg(short, long, value_name = "INCREMENT")]
    pub increment: Option<String>,

    /// Perform a dry run without making changes
    #[arg(short, long)]
    pub dry_run: bool,

    /// Run unattended, without prompts
    #[arg(long)]
    pub ci: bool,

    /// Release a pre-release, optionally with an identifier (e.g. beta)
    #[arg(long, value_name = "ID", num_args = 0..=1, default_missing_value = "")]
    pub pre_release: Option<String>,

    /// Start a fresh pre-release counter at this value
    #[arg(long, value_name = "BASE")]
    pub pre_release_base: Option<String>,

    /// Use this configuration file instead of searching for .shipwright.toml
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Print the release record as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReleaseArgs {
    /// Configuration layer built from the flags that were given.
    fn overrides(&self) -> Value {
        let mut layer = Map::new();
        if self.dry_run {
            layer.insert("dry-run".to_string(), json!(true));
        }
        if self.ci {
            layer.insert("ci".to_string(), json!(true));
        }
        if let Some(increment) = &self.increment {
            layer.insert("increment".to_string(), json!(increment));
        }
        match self.pre_release.as_deref() {
            Some("") => {
                layer.insert("pre-release".to_string(), json!(true));
            }
            Some(id) => {
                layer.insert("pre-release".to_string(), json!(id));
            }
            None => {}
        }
        if let Some(base) = &self.pre_release_base {
            layer.insert("pre-release-base".to_string(), json!(base));
        }
        Value::Object(layer)
    }
}

fn load(args: &ReleaseArgs, cwd: &Path) -> Result<Config> {
    let path = args.config.clone().or_else(|| find_config_file_from(cwd));
    let file = match path {
        Some(path) => {
            info!(path = %path.display(), "using configuration");
            Some(read_layer(&path).with_context(|| format!("failed to read {}", path.display()))?)
        }
        None => None,
    };
    resolve_config(file, args.overrides()).context("invalid configuration")
}

/// Human-readable outcome of a release.
fn summary(record: &ReleaseRecord, dry_run: bool) -> String {
    let mut out = String::new();
    let name = record.name.as_deref().unwrap_or("project");
    let _ = writeln!(
        out,
        "{}{name} {} -> {}",
        if dry_run { "[dry run] " } else { "" },
        record.latest_version,
        record.version
    );
    if let Some(tag) = &record.tag_name {
        let _ = writeln!(out, "  tag: {tag}");
    }
    for (namespace, target) in &record.targets {
        let state = match (&target.release_url, target.is_released) {
            (Some(url), _) => url.as_str(),
            (None, true) => "released",
            (None, false) => "not released",
        };
        let _ = writeln!(out, "  {namespace}: {state}");
    }
    for warning in &record.warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    out
}

/// Runs the release command.
///
/// An interrupt drops the running release, which rolls back local changes
/// that were not pushed yet.
pub async fn run(args: ReleaseArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let config = load(&args, &cwd)?;

    let shell = ProcessShell::new(&cwd).with_dry_run(config.dry_run);
    let services = Services::new(Arc::new(shell), Arc::new(TerminalPrompt::stdio()), &cwd);
    let mut orchestrator = Orchestrator::prepare(&config, &builtin_registry(), services)
        .context("failed to set up plugins")?;
    let dry_run = orchestrator.options().dry_run;

    let outcome = tokio::select! {
        result = orchestrator.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = outcome else {
        warn!("interrupted");
        drop(orchestrator);
        return Ok(ExitCode::from(INTERRUPTED));
    };

    let record = result.context("release failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", summary(&record, dry_run));
    }

    if record.all_released() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("not every target acknowledged the release");
        Ok(ExitCode::FAILURE)
    }
}
