//! Plugin traits.

pub mod release;

use async_trait::async_trait;
use semver::Version;

use crate::{Increment, Phase, PluginContext, PluginResult, PluginSetup, Step, VersionRequest};

/// The lifecycle contract every plugin implements.
///
/// Every method has a no-op default; plugins override what they need and
/// declare it through [`Plugin::handles`]. The orchestrator calls methods
/// one at a time in registration order.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns the plugin's context.
    fn context(&self) -> &PluginContext;

    /// Returns the namespace the plugin was registered under.
    fn namespace(&self) -> &str {
        self.context().namespace()
    }

    /// Returns whether the plugin takes part in `phase`.
    ///
    /// The orchestrator neither calls the method nor runs the plugin's
    /// scoped hooks for phases that are not handled.
    fn handles(&self, _phase: Phase) -> bool {
        false
    }

    /// Checks preconditions. Nothing may be mutated here.
    async fn init(&mut self) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Returns the project name.
    async fn get_name(&mut self) -> PluginResult<Option<String>> {
        Ok(None)
    }

    /// Returns the latest released version.
    async fn get_latest_version(&mut self) -> PluginResult<Option<String>> {
        Ok(None)
    }

    /// Returns the changelog since `latest_version`.
    async fn get_changelog(&mut self, _latest_version: &Version) -> PluginResult<Option<String>> {
        Ok(None)
    }

    /// Returns the requested or recommended increment.
    async fn get_increment(&mut self, _request: &VersionRequest) -> PluginResult<Option<Increment>> {
        Ok(None)
    }

    /// Computes the next version without asking anyone.
    async fn get_incremented_version_ci(
        &mut self,
        _request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        Ok(None)
    }

    /// Computes the next version, prompting the operator if needed.
    async fn get_incremented_version(
        &mut self,
        _request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        Ok(None)
    }

    /// Runs before any file is changed.
    async fn before_bump(&mut self) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Writes `version`.
    async fn bump(&mut self, _version: &Version) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Prepares local mutations.
    async fn before_release(&mut self) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Commits, tags, pushes or publishes.
    async fn release(&mut self) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Reports after a completed release.
    async fn after_release(&mut self) -> PluginResult<Step> {
        Ok(Step::Skipped)
    }

    /// Undoes local mutations after a failure.
    ///
    /// Remote actions are never reverted.
    async fn rollback(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

/// Constructs plugin instances for one namespace.
pub trait PluginFactory: Send + Sync {
    /// Returns whether the plugin should exist for this run.
    ///
    /// Evaluated before construction; disabled plugins are never created.
    fn is_enabled(&self, _setup: &PluginSetup) -> bool {
        true
    }

    /// Creates the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>>;
}
