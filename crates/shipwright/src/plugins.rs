//! Plugin wiring.

use std::sync::Arc;

use shipwright_core::PluginRegistry;
use shipwright_external::CommandPluginLoader;
use shipwright_registry_npm::NpmPluginFactory;
use shipwright_remote_release::RemoteReleaseFactory;
use shipwright_source_git::GitPluginFactory;
use shipwright_version::VersionPluginFactory;

/// Returns the registry of built-in plugins, in run order. Names in the
/// `[plugins]` table resolve to executables.
pub fn builtin_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_builtin("npm", NpmPluginFactory)
        .with_builtin("git", GitPluginFactory)
        .with_builtin("github", RemoteReleaseFactory::github())
        .with_builtin("gitlab", RemoteReleaseFactory::gitlab())
        .with_builtin("version", VersionPluginFactory)
        .with_loader(Arc::new(CommandPluginLoader))
}
