//! Release orchestration engine for Shipwright.
//!
//! This crate drives plugins through the release lifecycle:
//! - [`Orchestrator`]: phase sequencing, hook wrapping and rollback
//! - [`VersionResolver`]: next-version computation
//! - [`HookRunner`]: user-declared shell hooks
//! - [`RollbackGuard`]: scoped undo of local mutations
//! - [`RetryPolicy`]: retry and bail for remote calls
//! - [`PluginRegistry`]: built-in and third-party plugin factories

mod error;
mod hooks;
mod orchestrator;
mod record;
mod registry;
mod retry;
mod rollback;
mod shell;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod version;

pub use error::{CoreError, CoreResult};
pub use hooks::{HookPrefix, HookRunner, hook_name};
pub use orchestrator::{Orchestrator, RunOptions};
pub use record::{ReleaseRecord, TargetStatus};
pub use registry::{PluginLoader, PluginRegistry};
pub use retry::RetryPolicy;
pub use rollback::RollbackGuard;
pub use shell::ProcessShell;
pub use version::{Resolution, VersionResolver};
