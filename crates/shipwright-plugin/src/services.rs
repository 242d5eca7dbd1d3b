//! Per-run collaborators handed to every plugin.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::{ContextStore, PluginContext, Prompt, Shell};

/// Dependencies shared by all plugins of one run.
#[derive(Clone)]
pub struct Services {
    /// Command execution.
    pub shell: Arc<dyn Shell>,
    /// Operator questions.
    pub prompt: Arc<dyn Prompt>,
    /// Unattended run.
    pub ci: bool,
    /// Log side effects instead of performing them.
    pub dry_run: bool,
    /// Project directory.
    pub cwd: PathBuf,
}

impl Services {
    /// Creates services for an attended, non-dry run in `cwd`.
    #[must_use]
    pub fn new(shell: Arc<dyn Shell>, prompt: Arc<dyn Prompt>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            prompt,
            ci: false,
            dry_run: false,
            cwd: cwd.into(),
        }
    }

    /// Sets unattended mode.
    #[must_use]
    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    /// Sets dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("ci", &self.ci)
            .field("dry_run", &self.dry_run)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

/// Everything a factory needs to construct one plugin.
#[derive(Debug, Clone)]
pub struct PluginSetup {
    /// Namespace of the instance.
    pub namespace: String,
    /// Frozen options for the namespace.
    pub options: Value,
    /// Global context of the run.
    pub global: ContextStore,
    /// Shared collaborators.
    pub services: Services,
}

impl PluginSetup {
    /// Builds the plugin's context from the setup.
    #[must_use]
    pub fn context(&self) -> PluginContext {
        PluginContext::new(
            self.namespace.clone(),
            self.options.clone(),
            self.global.clone(),
        )
    }
}
