//! Third-party plugins backed by executables.
//!
//! Every name in the `[plugins]` table that no built-in factory claims is
//! resolved by [`CommandPluginLoader`] to an executable, by default
//! `shipwright-plugin-<name>` on `PATH`. For each handled phase the
//! executable runs once in the project directory with the phase name as its
//! last argument and a JSON request on stdin:
//!
//! ```json
//! {"phase": "bump", "namespace": "slack", "options": {}, "context": {},
//!  "dryRun": false, "ci": true, "version": "1.1.0"}
//! ```
//!
//! It answers with a JSON object on stdout; every field is optional and an
//! empty reply means "nothing to report":
//!
//! ```json
//! {"name": "...", "latestVersion": "...", "changelog": "...",
//!  "increment": "minor", "version": "1.1.0", "context": {},
//!  "warnings": [], "skipped": false}
//! ```
//!
//! A non-zero exit fails the phase with the captured stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use serde_json::{Value, json};
use shipwright_core::{CoreResult, PluginLoader};
use shipwright_plugin::{
    Increment, Phase, Plugin, PluginContext, PluginError, PluginFactory, PluginResult,
    PluginSetup, ShellError, Step, VersionRequest,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Prefix of the default executable name.
pub const COMMAND_PREFIX: &str = "shipwright-plugin-";

/// Resolves any plugin name to a [`CommandPluginFactory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPluginLoader;

impl PluginLoader for CommandPluginLoader {
    fn load(&self, name: &str) -> CoreResult<Arc<dyn PluginFactory>> {
        debug!(plugin = name, "resolving plugin to an executable");
        Ok(Arc::new(CommandPluginFactory))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CommandOptions {
    enabled: Option<bool>,
    command: Option<String>,
    args: Vec<String>,
    phases: Option<Vec<String>>,
}

/// Factory for [`CommandPlugin`]. Disabled by `enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPluginFactory;

impl PluginFactory for CommandPluginFactory {
    fn is_enabled(&self, setup: &PluginSetup) -> bool {
        !matches!(
            setup.context().options_as::<CommandOptions>(),
            Ok(CommandOptions {
                enabled: Some(false),
                ..
            })
        )
    }

    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
        Ok(Box::new(CommandPlugin::new(setup)?))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Reply {
    name: Option<String>,
    latest_version: Option<String>,
    changelog: Option<String>,
    increment: Option<String>,
    version: Option<String>,
    context: Option<Value>,
    warnings: Vec<String>,
    skipped: bool,
}

/// A plugin whose lifecycle methods run an executable.
pub struct CommandPlugin {
    context: PluginContext,
    program: String,
    args: Vec<String>,
    phases: Vec<Phase>,
    cwd: PathBuf,
    ci: bool,
    dry_run: bool,
    /// Reply kept for the second method of a two-method phase.
    pending: Option<(Phase, Reply)>,
}

impl CommandPlugin {
    /// Creates the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or name an unknown
    /// phase.
    pub fn new(setup: PluginSetup) -> PluginResult<Self> {
        let context = setup.context();
        let options: CommandOptions = context
            .options_as()
            .map_err(|e| PluginError::Config(format!("{}: {e}", context.namespace())))?;

        let phases: Vec<Phase> = match &options.phases {
            None => Phase::ALL.to_vec(),
            Some(names) => names
                .iter()
                .map(|name| {
                    Phase::ALL
                        .into_iter()
                        .find(|phase| phase.as_str() == name)
                        .ok_or_else(|| {
                            PluginError::Config(format!(
                                "{}: unknown phase `{name}`",
                                context.namespace()
                            ))
                        })
                })
                .collect::<PluginResult<_>>()?,
        };
        let program = options
            .command
            .unwrap_or_else(|| format!("{COMMAND_PREFIX}{}", context.namespace()));

        Ok(Self {
            program,
            args: options.args,
            phases,
            cwd: setup.services.cwd,
            ci: setup.services.ci,
            dry_run: setup.services.dry_run,
            pending: None,
            context,
        })
    }

    fn request(&self, phase: Phase, extra: Value) -> Value {
        let mut request = json!({
            "phase": phase.as_str(),
            "namespace": self.context.namespace(),
            "options": self.context.options(),
            "context": self.context.global().snapshot(),
            "dryRun": self.dry_run,
            "ci": self.ci,
        });
        if let (Some(request), Value::Object(extra)) = (request.as_object_mut(), extra) {
            request.extend(extra);
        }
        request
    }

    async fn invoke(&self, phase: Phase, extra: Value) -> PluginResult<Reply> {
        let shown = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain([phase.as_str()])
            .collect::<Vec<_>>()
            .join(" ");
        let failed = |code: Option<i32>, stderr: String| ShellError {
            command: shown.clone(),
            code,
            stderr,
        };
        debug!(namespace = self.context.namespace(), command = %shown, "running plugin");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(phase.as_str())
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(None, e.to_string()))?;

        let payload = serde_json::to_vec(&self.request(phase, extra))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A plugin may exit without reading its request.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "plugin closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(failed(output.status.code(), stderr).into());
        }
        if !stderr.is_empty() {
            debug!(namespace = self.context.namespace(), %stderr, "plugin stderr");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply: Reply = if stdout.trim().is_empty() {
            Reply::default()
        } else {
            serde_json::from_str(&stdout)?
        };

        if let Some(context) = &reply.context {
            self.context.set_context(context.clone());
        }
        for message in &reply.warnings {
            warn!(namespace = self.context.namespace(), "{message}");
            self.context.push_warning(message.clone());
        }
        Ok(reply)
    }

    /// Returns the reply held for `phase`, or runs the executable.
    async fn reply_for(&mut self, phase: Phase, extra: Value) -> PluginResult<Reply> {
        match self.pending.take() {
            Some((held, reply)) if held == phase => Ok(reply),
            _ => self.invoke(phase, extra).await,
        }
    }

    async fn step(&mut self, phase: Phase, extra: Value) -> PluginResult<Step> {
        let reply = self.invoke(phase, extra).await?;
        Ok(if reply.skipped {
            Step::Skipped
        } else {
            Step::Executed
        })
    }

    fn version_extra(request: &VersionRequest) -> Value {
        json!({
            "latestVersion": request.latest_version.to_string(),
            "increment": request.increment.as_ref().map(ToString::to_string),
            "isPreRelease": request.is_pre_release,
            "preReleaseId": request.pre_release_id,
        })
    }

    fn parse_version(&self, reply: &Reply) -> PluginResult<Option<Version>> {
        reply
            .version
            .as_deref()
            .map(|v| {
                Version::parse(v).map_err(|e| {
                    PluginError::Config(format!(
                        "{}: invalid version `{v}`: {e}",
                        self.context.namespace()
                    ))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl Plugin for CommandPlugin {
    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn handles(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    async fn init(&mut self) -> PluginResult<Step> {
        self.step(Phase::Init, json!({})).await
    }

    async fn get_name(&mut self) -> PluginResult<Option<String>> {
        Ok(self.invoke(Phase::ResolveName, json!({})).await?.name)
    }

    async fn get_latest_version(&mut self) -> PluginResult<Option<String>> {
        Ok(self
            .invoke(Phase::ResolveLatestVersion, json!({}))
            .await?
            .latest_version)
    }

    async fn get_changelog(&mut self, latest_version: &Version) -> PluginResult<Option<String>> {
        let extra = json!({ "latestVersion": latest_version.to_string() });
        let reply = self.invoke(Phase::ResolveIncrement, extra).await?;
        let changelog = reply.changelog.clone();
        self.pending = Some((Phase::ResolveIncrement, reply));
        Ok(changelog)
    }

    async fn get_increment(&mut self, request: &VersionRequest) -> PluginResult<Option<Increment>> {
        let reply = self
            .reply_for(Phase::ResolveIncrement, Self::version_extra(request))
            .await?;
        Ok(reply.increment.as_deref().map(Increment::parse))
    }

    async fn get_incremented_version_ci(
        &mut self,
        request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        let reply = self
            .invoke(Phase::ResolveVersion, Self::version_extra(request))
            .await?;
        let version = self.parse_version(&reply)?;
        if version.is_none() {
            self.pending = Some((Phase::ResolveVersion, reply));
        }
        Ok(version)
    }

    async fn get_incremented_version(
        &mut self,
        request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        let reply = self
            .reply_for(Phase::ResolveVersion, Self::version_extra(request))
            .await?;
        self.parse_version(&reply)
    }

    async fn before_bump(&mut self) -> PluginResult<Step> {
        self.step(Phase::BeforeBump, json!({})).await
    }

    async fn bump(&mut self, version: &Version) -> PluginResult<Step> {
        self.step(Phase::Bump, json!({ "version": version.to_string() }))
            .await
    }

    async fn before_release(&mut self) -> PluginResult<Step> {
        self.step(Phase::BeforeRelease, json!({})).await
    }

    async fn release(&mut self) -> PluginResult<Step> {
        self.step(Phase::Release, json!({})).await
    }

    async fn after_release(&mut self) -> PluginResult<Step> {
        self.step(Phase::AfterRelease, json!({})).await
    }
}
