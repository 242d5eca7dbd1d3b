//! Shell adapter contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::ShellError;

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// A command line interpreted by the system shell, with `${...}`
    /// placeholders rendered first.
    Line(String),
    /// A program and its arguments, executed without a shell.
    Args(Vec<String>),
}

impl ShellCommand {
    /// Builds an argument-vector command.
    #[must_use]
    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Args(args.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Args(args) => f.write_str(&args.join(" ")),
        }
    }
}

/// Options for one command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// The command changes state; dry runs skip it.
    pub write: bool,
    /// Template variables for `Line` commands.
    pub context: Value,
}

impl ExecOptions {
    /// Options for a read-only command.
    #[must_use]
    pub fn read() -> Self {
        Self::default()
    }

    /// Options for a state-changing command.
    #[must_use]
    pub fn write() -> Self {
        Self {
            write: true,
            context: Value::Null,
        }
    }

    /// Sets the template context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// Executes commands on behalf of plugins and hooks.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Runs `command` and returns its trimmed standard output.
    ///
    /// # Errors
    ///
    /// Returns a [`ShellError`] carrying standard error when the command
    /// fails or cannot be spawned.
    async fn exec(&self, command: &ShellCommand, options: &ExecOptions)
    -> Result<String, ShellError>;
}
