//! Release cycle driver.
//!
//! The [`Orchestrator`] walks every [`Phase`] in order. Within a phase,
//! plugins run one at a time in registration order, each wrapped by its
//! scoped hooks, and the whole phase is wrapped by the global hooks:
//!
//! ```text
//! before:<phase>
//!   before:<ns>:<phase>  <plugin method>  after:<ns>:<phase>
//! after:<phase>
//! ```
//!
//! A plugin that does not handle a phase is skipped entirely, and its
//! `after:` hook only fires when the method actually did something.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use semver::Version;
use serde_json::{Value, json};
use shipwright_config::Config;
use shipwright_config::merge::deep_merge;
use shipwright_plugin::{
    ContextStore, Increment, Phase, Plugin, PluginResult, Services, Step, VersionRequest,
};
use tracing::{debug, error, info, warn};

use crate::hooks::{HookPrefix, HookRunner, hook_name};
use crate::record::{ReleaseRecord, TargetStatus};
use crate::registry::PluginRegistry;
use crate::{CoreError, CoreResult};

/// Run-wide settings derived from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Unattended run: never prompt.
    pub ci: bool,
    /// Log state-changing actions instead of performing them.
    pub dry_run: bool,
    /// Explicitly requested increment.
    pub increment: Option<Increment>,
    /// Pre-release mode.
    pub is_pre_release: bool,
    /// Pre-release identifier.
    pub pre_release_id: Option<String>,
    /// Base of a fresh pre-release counter.
    pub pre_release_base: Option<String>,
}

impl RunOptions {
    /// Reads the run settings from `config`.
    ///
    /// When `ci` is not configured, a non-empty `CI` environment variable
    /// turns unattended mode on.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            ci: config.ci.unwrap_or_else(ci_from_env),
            dry_run: config.dry_run,
            increment: config.increment.as_ref().and_then(Increment::from_setting),
            is_pre_release: config.pre_release.is_enabled(),
            pre_release_id: config.pre_release.id().map(String::from),
            pre_release_base: config.pre_release_base.clone(),
        }
    }

    fn request(&self, latest_version: Version) -> VersionRequest {
        VersionRequest {
            latest_version,
            increment: self.increment.clone(),
            is_pre_release: self.is_pre_release,
            pre_release_id: self.pre_release_id.clone(),
            pre_release_base: self.pre_release_base.clone(),
            ci: self.ci,
        }
    }
}

fn ci_from_env() -> bool {
    std::env::var("CI").is_ok_and(|v| !v.is_empty() && v != "false" && v != "0")
}

/// What the cycle has established so far.
#[derive(Debug)]
struct CycleState {
    name: Option<String>,
    latest_version: Version,
    changelog: Option<String>,
    request: VersionRequest,
    version: Version,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            name: None,
            latest_version: Version::new(0, 0, 0),
            changelog: None,
            request: VersionRequest::new(Version::new(0, 0, 0)),
            version: Version::new(0, 0, 0),
        }
    }
}

/// Result of one plugin method call.
enum Outcome {
    Step(Step),
    Text(Option<String>),
    Increment {
        changelog: Option<String>,
        increment: Option<Increment>,
    },
    Version(Option<Version>),
}

impl Outcome {
    fn is_executed(&self) -> bool {
        match self {
            Self::Step(step) => step.is_executed(),
            _ => true,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => text,
            _ => None,
        }
    }

    fn into_version(self) -> Option<Version> {
        match self {
            Self::Version(version) => version,
            _ => None,
        }
    }
}

async fn invoke(
    plugin: &mut dyn Plugin,
    phase: Phase,
    cycle: &CycleState,
) -> PluginResult<Outcome> {
    Ok(match phase {
        Phase::Init => Outcome::Step(plugin.init().await?),
        Phase::ResolveName => Outcome::Text(plugin.get_name().await?),
        Phase::ResolveLatestVersion => Outcome::Text(plugin.get_latest_version().await?),
        Phase::ResolveIncrement => Outcome::Increment {
            changelog: plugin.get_changelog(&cycle.latest_version).await?,
            increment: plugin.get_increment(&cycle.request).await?,
        },
        Phase::ResolveVersion => {
            let version = match plugin.get_incremented_version_ci(&cycle.request).await? {
                Some(version) => Some(version),
                None => plugin.get_incremented_version(&cycle.request).await?,
            };
            Outcome::Version(version)
        }
        Phase::BeforeBump => Outcome::Step(plugin.before_bump().await?),
        Phase::Bump => Outcome::Step(plugin.bump(&cycle.version).await?),
        Phase::BeforeRelease => Outcome::Step(plugin.before_release().await?),
        Phase::Release => Outcome::Step(plugin.release().await?),
        Phase::AfterRelease => Outcome::Step(plugin.after_release().await?),
    })
}

/// Global context with the plugin's own merged context under its namespace.
fn hook_context(global: &ContextStore, plugin: &dyn Plugin) -> Value {
    let mut context = global.snapshot();
    if let Some(own) = plugin.context().get_context(None) {
        deep_merge(&mut context, json!({ plugin.namespace(): own }));
    }
    context
}

fn parse_version(input: &str) -> Option<Version> {
    let input = input.trim();
    Version::parse(input.strip_prefix('v').unwrap_or(input)).ok()
}

fn pre_release_id(version: &Version) -> Option<String> {
    version
        .pre
        .as_str()
        .split('.')
        .next()
        .filter(|id| !id.is_empty() && id.parse::<u64>().is_err())
        .map(String::from)
}

/// Drives enabled plugins through the release lifecycle.
pub struct Orchestrator {
    plugins: Vec<Box<dyn Plugin>>,
    hooks: HookRunner,
    global: ContextStore,
    options: RunOptions,
    cycle: CycleState,
    warnings: Vec<String>,
}

impl Orchestrator {
    /// Creates an orchestrator over already-instantiated plugins.
    ///
    /// `global` must be the store the plugins were created with.
    pub fn new(
        plugins: Vec<Box<dyn Plugin>>,
        hooks: HookRunner,
        global: ContextStore,
        options: RunOptions,
    ) -> Self {
        global.merge(json!({
            "ci": options.ci,
            "dryRun": options.dry_run,
            "isPreRelease": options.is_pre_release,
            "preReleaseId": options.pre_release_id,
        }));

        Self {
            plugins,
            hooks,
            global,
            options,
            cycle: CycleState::default(),
            warnings: Vec::new(),
        }
    }

    /// Instantiates the enabled plugins of `registry` for `config`.
    ///
    /// The `ci` and `dry_run` flags of `services` are overridden by the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a plugin cannot be resolved or created.
    pub fn prepare(
        config: &Config,
        registry: &PluginRegistry,
        services: Services,
    ) -> CoreResult<Self> {
        let options = RunOptions::from_config(config);
        let services = services
            .with_ci(options.ci)
            .with_dry_run(options.dry_run);
        let global = ContextStore::default();
        let plugins = registry.instantiate(config, &global, &services)?;
        let hooks = HookRunner::new(&config.hooks, Arc::clone(&services.shell));

        Ok(Self::new(plugins, hooks, global, options))
    }

    /// Returns the run settings.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Returns the global context.
    #[must_use]
    pub fn global(&self) -> &ContextStore {
        &self.global
    }

    /// Returns every hook point reached so far, in order.
    #[must_use]
    pub fn fired_hooks(&self) -> &[String] {
        self.hooks.fired()
    }

    /// Runs the release cycle to completion.
    ///
    /// A failure from `beforeBump` through `release` rolls back every
    /// plugin's local mutations, in reverse order, before the error is
    /// returned. Failures in `afterRelease` only become warnings.
    ///
    /// # Errors
    ///
    /// Returns the first fatal plugin, hook or version error.
    pub async fn run(&mut self) -> CoreResult<ReleaseRecord> {
        info!(
            plugins = self.plugins.len(),
            ci = self.options.ci,
            dry_run = self.options.dry_run,
            "starting release cycle"
        );

        self.phase(Phase::Init).await?;
        self.resolve().await?;

        for phase in [
            Phase::BeforeBump,
            Phase::Bump,
            Phase::BeforeRelease,
            Phase::Release,
        ] {
            if let Err(error) = self.phase(phase).await {
                self.rollback().await;
                return Err(error);
            }
        }

        if let Err(error) = self.phase(Phase::AfterRelease).await {
            error!(%error, "afterRelease failed");
            self.warnings.push(error.to_string());
        }

        let record = self.record();
        info!(
            version = %record.version,
            released = record.all_released(),
            "release cycle done"
        );
        Ok(record)
    }

    async fn resolve(&mut self) -> CoreResult<()> {
        self.cycle.name = self
            .phase(Phase::ResolveName)
            .await?
            .into_iter()
            .find_map(Outcome::into_text);
        if let Some(name) = &self.cycle.name {
            self.global.merge(json!({ "name": name }));
        }

        let latest = self
            .phase(Phase::ResolveLatestVersion)
            .await?
            .into_iter()
            .find_map(Outcome::into_text);
        let latest_version = match latest {
            Some(input) => parse_version(&input).ok_or(CoreError::InvalidVersion(input))?,
            None => Version::new(0, 0, 0),
        };
        debug!(latest = %latest_version, "resolved latest version");
        self.global
            .merge(json!({ "latestVersion": latest_version.to_string() }));
        self.cycle.request = self.options.request(latest_version.clone());
        self.cycle.latest_version = latest_version;

        let mut recommended = None;
        for outcome in self.phase(Phase::ResolveIncrement).await? {
            if let Outcome::Increment {
                changelog,
                increment,
            } = outcome
            {
                if self.cycle.changelog.is_none() {
                    self.cycle.changelog = changelog;
                }
                recommended = recommended.or(increment);
            }
        }
        if let Some(changelog) = &self.cycle.changelog {
            self.global.merge(json!({ "changelog": changelog }));
        }
        if self.cycle.request.increment.is_none() {
            self.cycle.request.increment = recommended;
        }
        debug!(increment = ?self.cycle.request.increment, "resolved increment");

        let version = self
            .phase(Phase::ResolveVersion)
            .await?
            .into_iter()
            .find_map(Outcome::into_version)
            .ok_or_else(|| CoreError::NoVersion(self.cycle.latest_version.to_string()))?;

        let pre_release_id = self
            .options
            .pre_release_id
            .clone()
            .or_else(|| pre_release_id(&version));
        self.global.merge(json!({
            "version": version.to_string(),
            "isPreRelease": !version.pre.is_empty(),
            "preReleaseId": pre_release_id,
        }));
        info!(latest = %self.cycle.latest_version, %version, "resolved version");
        self.cycle.version = version;

        Ok(())
    }

    async fn phase(&mut self, phase: Phase) -> CoreResult<Vec<Outcome>> {
        let Self {
            plugins,
            hooks,
            global,
            cycle,
            ..
        } = self;
        // Only the first plugin that settles the version gets to prompt.
        let first_only = phase == Phase::ResolveVersion;

        hooks
            .run(&hook_name(HookPrefix::Before, None, phase), &global.snapshot())
            .await?;

        let mut outcomes = Vec::new();
        for plugin in plugins.iter_mut().filter(|p| p.handles(phase)) {
            let namespace = plugin.namespace().to_string();

            hooks
                .run(
                    &hook_name(HookPrefix::Before, Some(&namespace), phase),
                    &hook_context(global, &**plugin),
                )
                .await?;

            debug!(%namespace, %phase, "running plugin");
            let outcome = invoke(&mut **plugin, phase, cycle)
                .await
                .map_err(|e| CoreError::plugin(&namespace, phase, e))?;

            if outcome.is_executed() {
                hooks
                    .run(
                        &hook_name(HookPrefix::After, Some(&namespace), phase),
                        &hook_context(global, &**plugin),
                    )
                    .await?;
            }

            let settled = first_only && matches!(outcome, Outcome::Version(Some(_)));
            outcomes.push(outcome);
            if settled {
                break;
            }
        }

        hooks
            .run(&hook_name(HookPrefix::After, None, phase), &global.snapshot())
            .await?;

        Ok(outcomes)
    }

    async fn rollback(&mut self) {
        for plugin in self.plugins.iter_mut().rev() {
            let namespace = plugin.namespace().to_string();
            if let Err(error) = plugin.rollback().await {
                warn!(%namespace, %error, "rollback failed");
            }
        }
    }

    fn record(&self) -> ReleaseRecord {
        let mut targets = BTreeMap::new();
        let mut warnings = Vec::new();

        for plugin in &self.plugins {
            let context = plugin.context();
            warnings.extend(
                context
                    .warnings()
                    .into_iter()
                    .map(|w| format!("{}: {w}", plugin.namespace())),
            );
            if plugin.handles(Phase::Release) {
                targets.insert(
                    plugin.namespace().to_string(),
                    TargetStatus {
                        is_released: context.get_bool("isReleased"),
                        release_url: context.get_str("releaseUrl"),
                    },
                );
            }
        }
        warnings.extend(self.warnings.iter().cloned());

        ReleaseRecord {
            name: self.cycle.name.clone(),
            latest_version: self.cycle.latest_version.clone(),
            version: self.cycle.version.clone(),
            is_pre_release: !self.cycle.version.pre.is_empty(),
            pre_release_id: self.global.get_str("preReleaseId"),
            tag_name: self.global.get_str("tagName"),
            changelog: self.cycle.changelog.clone(),
            targets,
            warnings,
            finished_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.namespace()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VersionResolver;
    use crate::testing::RecordingShell;
    use async_trait::async_trait;
    use shipwright_config::HookCommand;
    use shipwright_plugin::{NoPrompt, PluginContext, PluginError, PluginFactory, PluginSetup};
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Default)]
    struct Script {
        phases: Vec<Phase>,
        skipped: Vec<Phase>,
        fail_at: Option<Phase>,
        latest: Option<String>,
        changelog: Option<String>,
        increment: Option<Increment>,
        resolves_version: bool,
    }

    struct FakePlugin {
        context: PluginContext,
        script: Script,
        log: CallLog,
    }

    impl FakePlugin {
        fn step(&self, phase: Phase) -> PluginResult<Step> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{phase}", self.context.namespace()));
            if self.script.fail_at == Some(phase) {
                return Err(PluginError::LocalMutation(format!("{phase} exploded")));
            }
            if self.script.skipped.contains(&phase) {
                Ok(Step::Skipped)
            } else {
                Ok(Step::Executed)
            }
        }
    }

    #[async_trait]
    impl Plugin for FakePlugin {
        fn context(&self) -> &PluginContext {
            &self.context
        }

        fn handles(&self, phase: Phase) -> bool {
            self.script.phases.contains(&phase)
        }

        async fn init(&mut self) -> PluginResult<Step> {
            self.step(Phase::Init)
        }

        async fn get_latest_version(&mut self) -> PluginResult<Option<String>> {
            Ok(self.script.latest.clone())
        }

        async fn get_changelog(&mut self, _latest: &Version) -> PluginResult<Option<String>> {
            Ok(self.script.changelog.clone())
        }

        async fn get_increment(
            &mut self,
            _request: &VersionRequest,
        ) -> PluginResult<Option<Increment>> {
            Ok(self.script.increment.clone())
        }

        async fn get_incremented_version_ci(
            &mut self,
            request: &VersionRequest,
        ) -> PluginResult<Option<Version>> {
            if !self.script.resolves_version {
                return Ok(None);
            }
            Ok(VersionResolver::new().resolve(request).map(|r| r.version))
        }

        async fn before_bump(&mut self) -> PluginResult<Step> {
            self.step(Phase::BeforeBump)
        }

        async fn bump(&mut self, version: &Version) -> PluginResult<Step> {
            self.context
                .set_context(json!({ "tagName": format!("v{version}") }));
            self.step(Phase::Bump)
        }

        async fn before_release(&mut self) -> PluginResult<Step> {
            self.step(Phase::BeforeRelease)
        }

        async fn release(&mut self) -> PluginResult<Step> {
            let step = self.step(Phase::Release)?;
            if step.is_executed() {
                self.context.set_context(json!({
                    "isReleased": true,
                    "releaseUrl": format!("https://example.com/{}", self.context.namespace()),
                }));
            }
            Ok(step)
        }

        async fn after_release(&mut self) -> PluginResult<Step> {
            self.step(Phase::AfterRelease)
        }

        async fn rollback(&mut self) -> PluginResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:rollback", self.context.namespace()));
            Ok(())
        }
    }

    struct Harness {
        plugins: Vec<(String, Script)>,
        hooks: BTreeMap<String, HookCommand>,
        options: RunOptions,
        shell: Arc<RecordingShell>,
        log: CallLog,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                plugins: Vec::new(),
                hooks: BTreeMap::new(),
                options: RunOptions {
                    ci: true,
                    ..RunOptions::default()
                },
                shell: Arc::new(RecordingShell::default()),
                log: CallLog::default(),
            }
        }

        fn plugin(mut self, namespace: &str, script: Script) -> Self {
            self.plugins.push((namespace.to_string(), script));
            self
        }

        fn hook(mut self, name: &str, command: &str) -> Self {
            self.hooks
                .insert(name.to_string(), HookCommand::One(command.to_string()));
            self
        }

        fn increment(mut self, increment: &str) -> Self {
            self.options.increment = Some(Increment::parse(increment));
            self
        }

        fn orchestrator(&self) -> Orchestrator {
            let global = ContextStore::default();
            let plugins = self
                .plugins
                .iter()
                .map(|(ns, script)| {
                    Box::new(FakePlugin {
                        context: PluginContext::new(ns.as_str(), json!({}), global.clone()),
                        script: script.clone(),
                        log: self.log.clone(),
                    }) as Box<dyn Plugin>
                })
                .collect();
            let hooks = HookRunner::new(&self.hooks, self.shell.clone());
            Orchestrator::new(plugins, hooks, global, self.options.clone())
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    fn source(latest: &str) -> Script {
        Script {
            phases: vec![
                Phase::Init,
                Phase::ResolveLatestVersion,
                Phase::ResolveIncrement,
                Phase::Bump,
                Phase::BeforeRelease,
                Phase::Release,
            ],
            latest: Some(latest.to_string()),
            changelog: Some("* feat: rockets (abc1234)".to_string()),
            ..Script::default()
        }
    }

    fn version() -> Script {
        Script {
            phases: vec![Phase::ResolveVersion],
            resolves_version: true,
            ..Script::default()
        }
    }

    fn remote() -> Script {
        Script {
            phases: vec![Phase::Init, Phase::Release, Phase::AfterRelease],
            ..Script::default()
        }
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("github", remote())
            .plugin("version", version())
            .increment("minor");
        let mut orchestrator = harness.orchestrator();

        let record = orchestrator.run().await.unwrap();

        assert_eq!(record.latest_version, Version::new(1, 0, 0));
        assert_eq!(record.version, Version::new(1, 1, 0));
        assert_eq!(record.changelog.as_deref(), Some("* feat: rockets (abc1234)"));
        assert!(record.all_released());
        assert_eq!(record.targets.len(), 2);
        assert_eq!(
            harness.calls(),
            [
                "git:init",
                "github:init",
                "git:bump",
                "git:beforeRelease",
                "git:release",
                "github:release",
                "github:afterRelease",
            ]
        );
        assert_eq!(
            orchestrator.global().get_str("version").as_deref(),
            Some("1.1.0")
        );
    }

    #[tokio::test]
    async fn test_hooks_fire_around_each_plugin() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();
        orchestrator.run().await.unwrap();

        let fired = orchestrator.fired_hooks();
        let init: Vec<&str> = fired
            .iter()
            .map(String::as_str)
            .take_while(|h| !h.contains("resolveName"))
            .collect();
        assert_eq!(
            init,
            ["before:init", "before:git:init", "after:git:init", "after:init"]
        );
        assert!(fired.contains(&"after:version:resolveVersion".to_string()));
        assert!(!fired.iter().any(|h| h.starts_with("before:version:init")));
    }

    #[tokio::test]
    async fn test_skipped_step_suppresses_after_hook() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin(
                "github",
                Script {
                    skipped: vec![Phase::Release],
                    ..remote()
                },
            )
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();
        let record = orchestrator.run().await.unwrap();

        let fired = orchestrator.fired_hooks();
        assert!(fired.contains(&"before:github:release".to_string()));
        assert!(!fired.contains(&"after:github:release".to_string()));
        assert!(fired.contains(&"after:git:release".to_string()));
        assert!(!record.targets["github"].is_released);
    }

    #[tokio::test]
    async fn test_unhandled_phase_fires_no_scoped_hooks() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin(
                "github",
                Script {
                    phases: vec![Phase::Init],
                    ..Script::default()
                },
            )
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();
        let record = orchestrator.run().await.unwrap();

        let fired = orchestrator.fired_hooks();
        assert_eq!(
            fired.iter().filter(|h| h.contains(":github:release")).count(),
            0
        );
        assert!(!record.targets.contains_key("github"));
    }

    #[tokio::test]
    async fn test_each_hook_fires_once() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();
        orchestrator.run().await.unwrap();

        let fired = orchestrator.fired_hooks();
        let mut unique = fired.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), fired.len());
    }

    #[tokio::test]
    async fn test_hook_context_exposes_plugin_namespace() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version())
            .hook("after:git:bump", "echo ${git.tagName} ${version}")
            .hook("before:init", "echo ${dryRun}")
            .increment("minor");
        let mut orchestrator = harness.orchestrator();
        orchestrator.run().await.unwrap();

        assert_eq!(
            harness.shell.commands(),
            ["echo false", "echo v1.1.0 1.1.0"]
        );
    }

    #[tokio::test]
    async fn test_release_failure_rolls_back_in_reverse() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin(
                "npm",
                Script {
                    fail_at: Some(Phase::Release),
                    ..remote()
                },
            )
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();

        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "npm:release failed: local mutation failed: release exploded"
        );
        let calls = harness.calls();
        assert_eq!(
            &calls[calls.len() - 4..],
            ["npm:release", "version:rollback", "npm:rollback", "git:rollback"]
        );
        assert!(!orchestrator.fired_hooks().contains(&"after:release".to_string()));
    }

    #[tokio::test]
    async fn test_init_failure_does_not_roll_back() {
        let harness = Harness::new()
            .plugin(
                "git",
                Script {
                    fail_at: Some(Phase::Init),
                    ..source("1.0.0")
                },
            )
            .plugin("version", version());
        let mut orchestrator = harness.orchestrator();

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, CoreError::Plugin { phase: Phase::Init, .. }));
        assert_eq!(harness.calls(), ["git:init"]);
    }

    #[tokio::test]
    async fn test_hook_failure_in_release_rolls_back() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version())
            .hook("before:release", "exit 1")
            .increment("patch");
        let harness = Harness {
            shell: Arc::new(RecordingShell::default().failing("exit 1")),
            ..harness
        };
        let mut orchestrator = harness.orchestrator();

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, CoreError::Hook { ref hook, .. } if hook == "before:release"));
        assert_eq!(harness.calls().last().map(String::as_str), Some("git:rollback"));
    }

    #[tokio::test]
    async fn test_after_release_failure_becomes_warning() {
        let harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin(
                "github",
                Script {
                    fail_at: Some(Phase::AfterRelease),
                    ..remote()
                },
            )
            .plugin("version", version())
            .increment("patch");
        let mut orchestrator = harness.orchestrator();

        let record = orchestrator.run().await.unwrap();

        assert_eq!(record.version, Version::new(1, 0, 1));
        assert_eq!(record.warnings.len(), 1);
        assert!(record.warnings[0].starts_with("github:afterRelease failed"));
        assert!(!harness.calls().iter().any(|c| c.ends_with(":rollback")));
    }

    #[tokio::test]
    async fn test_latest_version_defaults_to_zero() {
        let harness = Harness::new()
            .plugin("version", version())
            .increment("minor");
        let record = harness.orchestrator().run().await.unwrap();
        assert_eq!(record.latest_version, Version::new(0, 0, 0));
        assert_eq!(record.version, Version::new(0, 1, 0));
    }

    #[tokio::test]
    async fn test_latest_version_accepts_v_prefix() {
        let harness = Harness::new()
            .plugin("git", source("v2.3.4"))
            .plugin("version", version())
            .increment("patch");
        let record = harness.orchestrator().run().await.unwrap();
        assert_eq!(record.version, Version::new(2, 3, 5));
    }

    #[tokio::test]
    async fn test_invalid_latest_version() {
        let harness = Harness::new()
            .plugin("git", source("not-a-version"))
            .plugin("version", version());
        let err = harness.orchestrator().run().await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidVersion(v) if v == "not-a-version"));
    }

    #[tokio::test]
    async fn test_no_version_when_nothing_resolves() {
        let mut harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version());
        harness.options.ci = false;

        let err = harness.orchestrator().run().await.unwrap_err();
        assert!(matches!(err, CoreError::NoVersion(v) if v == "1.0.0"));
    }

    #[tokio::test]
    async fn test_explicit_increment_beats_recommendation() {
        let harness = Harness::new()
            .plugin(
                "git",
                Script {
                    increment: Some(Increment::parse("major")),
                    ..source("1.0.0")
                },
            )
            .plugin("version", version())
            .increment("patch");
        let record = harness.orchestrator().run().await.unwrap();
        assert_eq!(record.version, Version::new(1, 0, 1));
    }

    #[tokio::test]
    async fn test_recommended_increment_applies_when_none_requested() {
        let harness = Harness::new()
            .plugin(
                "git",
                Script {
                    increment: Some(Increment::parse("major")),
                    ..source("1.0.0")
                },
            )
            .plugin("version", version());
        let record = harness.orchestrator().run().await.unwrap();
        assert_eq!(record.version, Version::new(2, 0, 0));
    }

    #[tokio::test]
    async fn test_pre_release_state_is_promoted() {
        let mut harness = Harness::new()
            .plugin("git", source("1.0.0"))
            .plugin("version", version())
            .increment("minor");
        harness.options.is_pre_release = true;
        harness.options.pre_release_id = Some("beta".to_string());

        let mut orchestrator = harness.orchestrator();
        let record = orchestrator.run().await.unwrap();

        assert_eq!(record.version.to_string(), "1.1.0-beta.0");
        assert!(record.is_pre_release);
        assert_eq!(record.pre_release_id.as_deref(), Some("beta"));
        assert_eq!(orchestrator.global().get("isPreRelease"), Some(json!(true)));
    }

    #[test]
    fn test_run_options_from_config() {
        let config = Config {
            ci: Some(true),
            dry_run: true,
            increment: Some(shipwright_config::IncrementSetting::Flag(false)),
            pre_release: shipwright_config::PreReleaseSetting::Id("rc".to_string()),
            ..Config::default()
        };
        let options = RunOptions::from_config(&config);

        assert!(options.ci);
        assert!(options.dry_run);
        assert_eq!(options.increment, Some(Increment::NoBump));
        assert!(options.is_pre_release);
        assert_eq!(options.pre_release_id.as_deref(), Some("rc"));
    }

    #[tokio::test]
    async fn test_prepare_wires_registry() {
        struct Factory;
        impl PluginFactory for Factory {
            fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
                assert!(setup.services.ci);
                Ok(Box::new(FakePlugin {
                    context: setup.context(),
                    script: version(),
                    log: CallLog::default(),
                }))
            }
        }

        let registry = PluginRegistry::new().with_builtin("version", Factory);
        let config = Config {
            ci: Some(true),
            increment: Some(shipwright_config::IncrementSetting::Value("major".to_string())),
            ..Config::default()
        };
        let services = Services::new(Arc::new(RecordingShell::default()), Arc::new(NoPrompt), ".");

        let mut orchestrator = Orchestrator::prepare(&config, &registry, services).unwrap();
        let record = orchestrator.run().await.unwrap();
        assert_eq!(record.version, Version::new(1, 0, 0));
    }
}
