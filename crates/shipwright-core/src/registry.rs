//! Plugin registry and instantiation.
//!
//! Built-in plugins are registered by name in a fixed order. Third-party
//! plugins are named in the `[plugins]` configuration table and resolved
//! through a [`PluginLoader`]; they always run before the built-ins, in the
//! order the table declares them.

use std::collections::BTreeMap;
use std::sync::Arc;

use shipwright_config::Config;
use shipwright_plugin::{ContextStore, Phase, Plugin, PluginFactory, PluginSetup, Services};
use tracing::{debug, info};

use crate::{CoreError, CoreResult};

/// Resolves third-party plugin names to factories.
pub trait PluginLoader: Send + Sync {
    /// Returns the factory for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PluginNotFound`] for unknown names.
    fn load(&self, name: &str) -> CoreResult<Arc<dyn PluginFactory>>;
}

/// Named plugin factories.
#[derive(Default)]
pub struct PluginRegistry {
    builtins: Vec<(String, Arc<dyn PluginFactory>)>,
    external: BTreeMap<String, Arc<dyn PluginFactory>>,
    fallback: Option<Arc<dyn PluginLoader>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built-in plugin. Registration order is run order.
    #[must_use]
    pub fn with_builtin(
        mut self,
        namespace: impl Into<String>,
        factory: impl PluginFactory + 'static,
    ) -> Self {
        self.builtins.push((namespace.into(), Arc::new(factory)));
        self
    }

    /// Registers a plugin resolvable from the `[plugins]` table.
    #[must_use]
    pub fn with_external(
        mut self,
        name: impl Into<String>,
        factory: impl PluginFactory + 'static,
    ) -> Self {
        self.external.insert(name.into(), Arc::new(factory));
        self
    }

    /// Resolves `[plugins]` names that were not registered with
    /// [`PluginRegistry::with_external`] through `loader`.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.fallback = Some(loader);
        self
    }

    /// Returns the built-in namespaces in run order.
    pub fn builtin_namespaces(&self) -> impl Iterator<Item = &str> {
        self.builtins.iter().map(|(name, _)| name.as_str())
    }

    /// Creates every enabled plugin, resolving external ones through the
    /// registry itself.
    ///
    /// # Errors
    ///
    /// See [`PluginRegistry::instantiate_with`].
    pub fn instantiate(
        &self,
        config: &Config,
        global: &ContextStore,
        services: &Services,
    ) -> CoreResult<Vec<Box<dyn Plugin>>> {
        self.instantiate_with(self, config, global, services)
    }

    /// Creates every enabled plugin: external plugins from the `[plugins]`
    /// table first, then built-ins in registration order.
    ///
    /// Disabled plugins are never constructed.
    ///
    /// # Errors
    ///
    /// Returns an error if an external plugin cannot be resolved, options
    /// cannot be read, or a factory rejects its options.
    pub fn instantiate_with(
        &self,
        loader: &dyn PluginLoader,
        config: &Config,
        global: &ContextStore,
        services: &Services,
    ) -> CoreResult<Vec<Box<dyn Plugin>>> {
        let mut candidates = Vec::new();
        for name in config.plugins.keys() {
            candidates.push((name.clone(), loader.load(name)?));
        }
        candidates.extend(
            self.builtins
                .iter()
                .map(|(name, factory)| (name.clone(), Arc::clone(factory))),
        );

        let mut plugins = Vec::new();
        for (namespace, factory) in candidates {
            let setup = PluginSetup {
                options: config.namespace_options(&namespace)?,
                namespace: namespace.clone(),
                global: global.clone(),
                services: services.clone(),
            };

            if !factory.is_enabled(&setup) {
                debug!(%namespace, "plugin disabled");
                continue;
            }

            let plugin = factory
                .create(setup)
                .map_err(|e| CoreError::plugin(&namespace, Phase::Init, e))?;
            plugins.push(plugin);
        }

        info!(
            plugins = ?plugins.iter().map(|p| p.namespace()).collect::<Vec<_>>(),
            "plugins enabled"
        );
        Ok(plugins)
    }
}

impl PluginLoader for PluginRegistry {
    fn load(&self, name: &str) -> CoreResult<Arc<dyn PluginFactory>> {
        if let Some(factory) = self.external.get(name) {
            return Ok(Arc::clone(factory));
        }
        match &self.fallback {
            Some(loader) => loader.load(name),
            None => Err(CoreError::PluginNotFound(name.to_string())),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("builtins", &self.builtin_namespaces().collect::<Vec<_>>())
            .field("external", &self.external.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
