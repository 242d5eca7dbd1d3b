//! Process-backed shell adapter.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use shipwright_plugin::{ExecOptions, Shell, ShellCommand, ShellError, template};
use tokio::process::Command;
use tracing::{debug, info};

/// Runs commands as child processes in a fixed directory.
#[derive(Debug, Clone)]
pub struct ProcessShell {
    cwd: PathBuf,
    dry_run: bool,
}

impl ProcessShell {
    /// Creates a shell running commands in `cwd`.
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            dry_run: false,
        }
    }

    /// Skips state-changing commands, logging them instead.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn command(&self, command: &ShellCommand, options: &ExecOptions) -> (Command, String) {
        let (mut cmd, shown) = match command {
            ShellCommand::Line(line) => {
                let rendered = template::render(line, &options.context);
                let mut cmd = if cfg!(windows) {
                    let mut cmd = Command::new("cmd");
                    cmd.arg("/C");
                    cmd
                } else {
                    let mut cmd = Command::new("sh");
                    cmd.arg("-c");
                    cmd
                };
                cmd.arg(&rendered);
                (cmd, rendered)
            }
            ShellCommand::Args(args) => {
                let mut cmd = Command::new(args.first().map_or("", String::as_str));
                cmd.args(args.iter().skip(1));
                (cmd, command.to_string())
            }
        };
        cmd.current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        (cmd, shown)
    }
}

#[async_trait]
impl Shell for ProcessShell {
    async fn exec(
        &self,
        command: &ShellCommand,
        options: &ExecOptions,
    ) -> Result<String, ShellError> {
        let (mut cmd, shown) = self.command(command, options);

        if self.dry_run && options.write {
            info!(command = %shown, dry_run = true, "skipping command");
            return Ok(String::new());
        }

        debug!(command = %shown, "exec");
        let output = cmd.output().await.map_err(|e| ShellError {
            command: shown.clone(),
            code: None,
            stderr: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ShellError {
            command: shown,
            code: output.status.code(),
            stderr: if stderr.is_empty() { stdout } else { stderr },
        })
    }
}
