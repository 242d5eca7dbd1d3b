//! npm registry plugin.
//!
//! Reads the package name and version from `package.json`, writes the new
//! version with `npm version` and publishes with `npm publish`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use serde_json::json;
use shipwright_config::NpmConfig;
use shipwright_plugin::{
    ExecOptions, Phase, Plugin, PluginContext, PluginError, PluginFactory, PluginResult,
    PluginSetup, Services, ShellCommand, Step,
};
use tracing::{debug, info};

const MANIFEST: &str = "package.json";
const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
const DEFAULT_WEB: &str = "https://www.npmjs.com";

/// The parts of `package.json` the plugin reads.
#[derive(Debug, Clone, Default, Deserialize)]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    private: bool,
}

/// Built-in plugin owning the `npm` namespace.
pub struct NpmPlugin {
    context: PluginContext,
    services: Services,
    options: NpmConfig,
    manifest: Manifest,
}

impl NpmPlugin {
    /// Creates the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(setup: PluginSetup) -> PluginResult<Self> {
        let context = setup.context();
        let options = context
            .options_as()
            .map_err(|e| PluginError::Config(format!("npm: {e}")))?;
        Ok(Self {
            context,
            services: setup.services,
            options,
            manifest: Manifest::default(),
        })
    }

    fn manifest_path(&self) -> PathBuf {
        self.services.cwd.join(MANIFEST)
    }

    fn registry_args(&self) -> Vec<String> {
        self.options
            .registry
            .iter()
            .flat_map(|r| ["--registry".to_string(), r.clone()])
            .collect()
    }

    async fn npm(&self, args: Vec<String>, write: bool) -> PluginResult<String> {
        let command = ShellCommand::Args(std::iter::once("npm".to_string()).chain(args).collect());
        let options = if write {
            ExecOptions::write()
        } else {
            ExecOptions::read()
        };
        Ok(self.services.shell.exec(&command, &options).await?)
    }

    /// Dist tag for this release. Pre-releases never go to `latest`.
    fn dist_tag(&self) -> String {
        let global = self.context.global();
        let is_pre_release = global
            .get("isPreRelease")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if is_pre_release && self.options.tag == "latest" {
            global
                .get_str("preReleaseId")
                .unwrap_or_else(|| "next".to_string())
        } else {
            self.options.tag.clone()
        }
    }

    fn package_url(&self, name: &str, version: &str) -> String {
        let base = match self.options.registry.as_deref() {
            Some(registry) if registry.trim_end_matches('/') != DEFAULT_REGISTRY => {
                registry.trim_end_matches('/')
            }
            _ => DEFAULT_WEB,
        };
        format!("{base}/package/{name}/v/{version}")
    }
}

async fn read_manifest(path: &Path) -> PluginResult<Manifest> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| PluginError::Config(format!("invalid {}: {e}", path.display())))
}

#[async_trait]
impl Plugin for NpmPlugin {
    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn handles(&self, phase: Phase) -> bool {
        match phase {
            Phase::Init | Phase::ResolveName | Phase::ResolveLatestVersion => true,
            Phase::Bump => !self.options.ignore_version,
            Phase::Release => !self.manifest.private,
            _ => false,
        }
    }

    async fn init(&mut self) -> PluginResult<Step> {
        self.manifest = read_manifest(&self.manifest_path()).await?;
        if self.manifest.private {
            info!("package is private, it will not be published");
        }

        if self.options.skip_checks {
            debug!("skipping npm checks");
            return Ok(Step::Executed);
        }

        let mut args = vec!["whoami".to_string()];
        args.extend(self.registry_args());
        let user = self.npm(args, false).await.map_err(|e| {
            PluginError::Precondition(format!("not authenticated with npm: {e}"))
        })?;
        if user.is_empty() {
            return Err(PluginError::Precondition(
                "not authenticated with npm".to_string(),
            ));
        }
        debug!(%user, "npm user");
        self.context.set_context(json!({ "username": user }));
        Ok(Step::Executed)
    }

    async fn get_name(&mut self) -> PluginResult<Option<String>> {
        Ok(self.manifest.name.clone())
    }

    async fn get_latest_version(&mut self) -> PluginResult<Option<String>> {
        if self.options.ignore_version {
            return Ok(None);
        }
        Ok(self.manifest.version.clone())
    }

    async fn bump(&mut self, version: &Version) -> PluginResult<Step> {
        let version = version.to_string();
        if self.manifest.version.as_deref() == Some(version.as_str()) {
            debug!(%version, "package.json already at version");
            return Ok(Step::Skipped);
        }

        self.npm(
            vec![
                "version".to_string(),
                version,
                "--no-git-tag-version".to_string(),
            ],
            true,
        )
        .await?;
        Ok(Step::Executed)
    }

    async fn release(&mut self) -> PluginResult<Step> {
        let name = self
            .manifest
            .name
            .clone()
            .ok_or_else(|| PluginError::Config("package.json has no name".to_string()))?;
        let version = self.context.global().get_str("version").unwrap_or_default();
        let tag = self.dist_tag();

        let mut args = vec![
            "publish".to_string(),
            self.options.publish_path.clone(),
            "--tag".to_string(),
            tag.clone(),
        ];
        if let Some(access) = &self.options.access {
            args.extend(["--access".to_string(), access.clone()]);
        }
        args.extend(self.registry_args());

        self.npm(args, true).await?;

        let url = self.package_url(&name, &version);
        info!(package = %name, %version, %tag, dry_run = self.services.dry_run, "published to npm");
        self.context.set_context(json!({
            "isReleased": true,
            "releaseUrl": url,
        }));
        Ok(Step::Executed)
    }
}

/// Factory for [`NpmPlugin`].
///
/// Enabled when `npm.publish` is set and a `package.json` exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpmPluginFactory;

impl PluginFactory for NpmPluginFactory {
    fn is_enabled(&self, setup: &PluginSetup) -> bool {
        let publish = setup
            .options
            .get("publish")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        publish && setup.services.cwd.join(MANIFEST).is_file()
    }

    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
        Ok(Box::new(NpmPlugin::new(setup)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use shipwright_core::testing::RecordingShell;
    use shipwright_plugin::{ContextStore, NoPrompt};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        shell: Arc<RecordingShell>,
        global: ContextStore,
    }

    impl Fixture {
        fn new(manifest: &str, shell: RecordingShell) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(MANIFEST), manifest).unwrap();
            Self {
                dir,
                shell: Arc::new(shell),
                global: ContextStore::default(),
            }
        }

        fn setup(&self, options: Value) -> PluginSetup {
            PluginSetup {
                namespace: "npm".to_string(),
                options,
                global: self.global.clone(),
                services: Services::new(self.shell.clone(), Arc::new(NoPrompt), self.dir.path()),
            }
        }

        fn plugin(&self, options: Value) -> NpmPlugin {
            NpmPlugin::new(self.setup(options)).unwrap()
        }
    }

    const PACKAGE: &str = r#"{"name": "rocket", "version": "1.0.0"}"#;

    #[test]
    fn test_enabled_only_with_publish_and_manifest() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default());
        assert!(NpmPluginFactory.is_enabled(&fixture.setup(json!({"publish": true}))));
        assert!(!NpmPluginFactory.is_enabled(&fixture.setup(json!({"publish": false}))));

        std::fs::remove_file(fixture.dir.path().join(MANIFEST)).unwrap();
        assert!(!NpmPluginFactory.is_enabled(&fixture.setup(json!({"publish": true}))));
    }

    #[tokio::test]
    async fn test_init_reads_manifest_and_checks_auth() {
        let fixture = Fixture::new(
            PACKAGE,
            RecordingShell::default().with_output("npm whoami", "alice"),
        );
        let mut plugin = fixture.plugin(json!({"publish": true}));

        assert_eq!(plugin.init().await.unwrap(), Step::Executed);
        assert_eq!(plugin.get_name().await.unwrap().as_deref(), Some("rocket"));
        assert_eq!(
            plugin.get_latest_version().await.unwrap().as_deref(),
            Some("1.0.0")
        );
        assert_eq!(plugin.context().get_str("username").as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_init_fails_when_not_authenticated() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default().failing("npm whoami"));
        let mut plugin = fixture.plugin(json!({"publish": true}));

        let err = plugin.init().await.unwrap_err();
        assert!(matches!(err, PluginError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_skip_checks() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default().failing("npm whoami"));
        let mut plugin = fixture.plugin(json!({"publish": true, "skip-checks": true}));

        // The manifest is still read, so the step counts as executed.
        assert_eq!(plugin.init().await.unwrap(), Step::Executed);
        assert!(fixture.shell.commands().is_empty());
        assert_eq!(plugin.get_name().await.unwrap().as_deref(), Some("rocket"));
    }

    #[tokio::test]
    async fn test_bump_and_publish() {
        let fixture = Fixture::new(
            PACKAGE,
            RecordingShell::default().with_output("npm whoami", "alice"),
        );
        let mut plugin = fixture.plugin(json!({"publish": true, "access": "public"}));
        fixture.global.merge(json!({"version": "1.1.0"}));

        plugin.init().await.unwrap();
        assert_eq!(
            plugin.bump(&Version::new(1, 1, 0)).await.unwrap(),
            Step::Executed
        );
        assert_eq!(plugin.release().await.unwrap(), Step::Executed);

        insta::assert_snapshot!(fixture.shell.writes().join("\n"), @r"
        npm version 1.1.0 --no-git-tag-version
        npm publish . --tag latest --access public
        ");
        assert!(plugin.context().get_bool("isReleased"));
        assert_eq!(
            plugin.context().get_str("releaseUrl").as_deref(),
            Some("https://www.npmjs.com/package/rocket/v/1.1.0")
        );
    }

    #[tokio::test]
    async fn test_bump_to_current_version_is_skipped() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default());
        let mut plugin = fixture.plugin(json!({"publish": true, "skip-checks": true}));
        plugin.init().await.unwrap();

        let step = plugin.bump(&Version::new(1, 0, 0)).await.unwrap();
        assert_eq!(step, Step::Skipped);
        assert!(fixture.shell.writes().is_empty());
    }

    #[tokio::test]
    async fn test_pre_release_uses_pre_release_tag() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default());
        let mut plugin = fixture.plugin(json!({"publish": true, "skip-checks": true}));
        fixture.global.merge(json!({
            "version": "1.1.0-beta.0",
            "isPreRelease": true,
            "preReleaseId": "beta",
        }));
        plugin.init().await.unwrap();
        plugin.release().await.unwrap();

        assert_eq!(fixture.shell.writes(), ["npm publish . --tag beta"]);
    }

    #[tokio::test]
    async fn test_private_package_is_not_released() {
        let fixture = Fixture::new(
            r#"{"name": "internal", "version": "1.0.0", "private": true}"#,
            RecordingShell::default(),
        );
        let mut plugin = fixture.plugin(json!({"publish": true, "skip-checks": true}));
        plugin.init().await.unwrap();
        assert!(!plugin.handles(Phase::Release));
        assert!(plugin.handles(Phase::Bump));
    }

    #[tokio::test]
    async fn test_custom_registry() {
        let fixture = Fixture::new(PACKAGE, RecordingShell::default());
        let mut plugin = fixture.plugin(json!({
            "publish": true,
            "skip-checks": true,
            "registry": "https://npm.example.com/",
        }));
        fixture.global.merge(json!({"version": "1.1.0"}));
        plugin.init().await.unwrap();
        plugin.release().await.unwrap();

        assert_eq!(
            fixture.shell.writes(),
            ["npm publish . --tag latest --registry https://npm.example.com/"]
        );
        assert_eq!(
            plugin.context().get_str("releaseUrl").as_deref(),
            Some("https://npm.example.com/package/rocket/v/1.1.0")
        );
    }

    #[tokio::test]
    async fn test_invalid_manifest() {
        let fixture = Fixture::new("{not json", RecordingShell::default());
        let mut plugin = fixture.plugin(json!({"publish": true}));
        let err = plugin.init().await.unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }
}
