//! Core error types.

use shipwright_plugin::{Phase, PluginError, ShellError};
use thiserror::Error;

/// Core-related errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A plugin failed during a lifecycle phase.
    #[error("{namespace}:{phase} failed: {source}")]
    Plugin {
        /// Namespace of the failing plugin.
        namespace: String,
        /// Phase that failed.
        phase: Phase,
        /// Underlying plugin error.
        #[source]
        source: PluginError,
    },

    /// A reported version is not valid semver.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// No plugin could determine the next version.
    #[error("no version could be determined from {0}")]
    NoVersion(String),

    /// A hook command failed.
    #[error("hook `{hook}` failed: {source}")]
    Hook {
        /// Hook name, e.g. `before:git:release`.
        hook: String,
        /// Underlying shell error.
        #[source]
        source: ShellError,
    },

    /// A configured plugin cannot be resolved.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] shipwright_config::ConfigError),
}

impl CoreError {
    pub(crate) fn plugin(namespace: &str, phase: Phase, source: PluginError) -> Self {
        Self::Plugin {
            namespace: namespace.to_string(),
            phase,
            source,
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
