//! Plugin contract for Shipwright.
//!
//! This crate defines what plugins and the orchestrator share:
//! - [`Plugin`]: the lifecycle every plugin implements
//! - [`PluginFactory`]: enablement check and construction
//! - [`PluginContext`] / [`ContextStore`]: run-scoped state
//! - [`Shell`] / [`Prompt`]: I/O adapters injected through [`Services`]
//! - [`ReleaseApi`]: release-hosting operations and their capabilities

mod context;
mod error;
mod increment;
mod lifecycle;
mod prompt;
mod services;
mod shell;
pub mod template;
mod traits;

pub use context::{ContextStore, PluginContext};
pub use error::{PluginError, PluginResult, RemoteError, ShellError, TERMINAL_STATUSES};
pub use increment::{Increment, ReleaseType, VersionRequest};
pub use lifecycle::{Phase, Step};
pub use prompt::{Choice, NoPrompt, Prompt, Question, QuestionKind};
pub use services::{PluginSetup, Services};
pub use shell::{ExecOptions, Shell, ShellCommand};
pub use traits::release::{
    AssetUpload, CollaboratorCheck, ReleaseApi, ReleaseApiProvider, ReleaseDraft, RemoteRelease,
    RepoCoordinates,
};
pub use traits::{Plugin, PluginFactory};
