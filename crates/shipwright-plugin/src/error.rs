//! Plugin error types.
//!
//! The variants follow the failure classes of a release run, so callers can
//! tell a bad configuration from a failed precondition or a remote outage.

use thiserror::Error;

/// HTTP statuses on which a remote call bails instead of retrying.
pub const TERMINAL_STATUSES: [u16; 4] = [400, 401, 404, 422];

/// Plugin-related errors.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A precondition checked during `init` does not hold.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A local commit or tag could not be created.
    #[error("local mutation failed: {0}")]
    LocalMutation(String),

    /// A remote service call failed.
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// A shell command failed.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// The operator prompt failed or was aborted.
    #[error("prompt failed: {0}")]
    Prompt(String),

    /// Git error.
    #[error("git error: {0}")]
    Git(#[from] shipwright_git::GitError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// A failed call to a remote API, normalized across hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status, absent for transport failures.
    pub status: Option<u16>,
    /// Provider message.
    pub message: String,
}

impl RemoteError {
    /// Creates an error for an HTTP response.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an error for a network or timeout failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Returns whether retrying cannot help.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| TERMINAL_STATUSES.contains(&s))
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{status} ({})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// A shell command exited unsuccessfully or could not be spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command `{command}` failed: {stderr}")]
pub struct ShellError {
    /// The command as rendered.
    pub command: String,
    /// Exit code, if the process ran.
    pub code: Option<i32>,
    /// Captured standard error (or spawn failure).
    pub stderr: String,
}
