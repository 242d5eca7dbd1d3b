//! Remote release plugins for GitHub and GitLab.
//!
//! One [`RemoteReleasePlugin`] implementation serves both hosts: the host
//! decides defaults and URL shapes, while all API traffic goes through a
//! [`ReleaseApi`] obtained from a [`ReleaseApiProvider`]. Every API call is
//! wrapped by the namespace's [`RetryPolicy`]; in dry-run mode the policy
//! answers writes with a release synthesized from the host's URL scheme.
//!
//! Remote releases are never rolled back.

mod github;
mod gitlab;
mod http;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use shipwright_config::RemoteReleaseConfig;
use shipwright_core::RetryPolicy;
use shipwright_plugin::{
    Phase, Plugin, PluginContext, PluginError, PluginFactory, PluginResult, PluginSetup,
    ReleaseApi, ReleaseApiProvider, ReleaseDraft, RemoteRelease, RepoCoordinates, Services, Step,
    template,
};
use tracing::{debug, info, warn};

pub use github::GithubApi;
pub use gitlab::GitlabApi;

/// Looks up an environment variable.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// A supported release host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// GitHub or GitHub Enterprise.
    GitHub,
    /// GitLab, hosted or self-managed.
    GitLab,
}

impl Host {
    /// Configuration namespace.
    #[must_use]
    pub fn namespace(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }

    /// Web host used when the remote does not name one.
    #[must_use]
    pub fn default_host(self) -> &'static str {
        match self {
            Self::GitHub => "github.com",
            Self::GitLab => "gitlab.com",
        }
    }

    /// Environment variable holding the token when `token-ref` is unset.
    #[must_use]
    pub fn token_env(self) -> &'static str {
        match self {
            Self::GitHub => "GITHUB_TOKEN",
            Self::GitLab => "GITLAB_TOKEN",
        }
    }

    /// API base URL for a web host.
    #[must_use]
    pub fn api_url(self, host: &str) -> String {
        match self {
            Self::GitHub => github::api_url(host),
            Self::GitLab => gitlab::api_url(host),
        }
    }

    /// Web URL of the release for `tag`.
    #[must_use]
    pub fn release_url(self, host: &str, repository: &str, tag: &str) -> String {
        match self {
            Self::GitHub => format!("https://{host}/{repository}/releases/tag/{tag}"),
            Self::GitLab => format!("https://{host}/{repository}/-/releases/{tag}"),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
        })
    }
}

impl ReleaseApiProvider for Host {
    fn connect(&self, coordinates: &RepoCoordinates) -> PluginResult<Arc<dyn ReleaseApi>> {
        Ok(match self {
            Self::GitHub => Arc::new(GithubApi::new(coordinates.clone())?),
            Self::GitLab => Arc::new(GitlabApi::new(coordinates.clone())?),
        })
    }
}

/// Built-in plugin owning the `github` or `gitlab` namespace.
pub struct RemoteReleasePlugin {
    context: PluginContext,
    services: Services,
    options: RemoteReleaseConfig,
    host: Host,
    provider: Arc<dyn ReleaseApiProvider>,
    env: EnvLookup,
    retry: RetryPolicy,
    api: Option<Arc<dyn ReleaseApi>>,
}

impl RemoteReleasePlugin {
    /// Creates the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(
        setup: PluginSetup,
        host: Host,
        provider: Arc<dyn ReleaseApiProvider>,
    ) -> PluginResult<Self> {
        let context = setup.context();
        let options: RemoteReleaseConfig = context
            .options_as()
            .map_err(|e| PluginError::Config(format!("{}: {e}", host.namespace())))?;
        let retry = RetryPolicy::from(&options.retry);

        Ok(Self {
            context,
            services: setup.services,
            options,
            host,
            provider,
            env: process_env,
            retry,
            api: None,
        })
    }

    /// Replaces the environment lookup used for the token.
    #[must_use]
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    fn ns(&self) -> &'static str {
        self.host.namespace()
    }

    fn token(&self) -> PluginResult<String> {
        let name = self
            .options
            .token_ref
            .as_deref()
            .unwrap_or_else(|| self.host.token_env());
        (self.env)(name)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                PluginError::Config(format!(
                    "{}: environment variable {name} is required for {} releases",
                    self.ns(),
                    self.host
                ))
            })
    }

    fn coordinates(&self) -> PluginResult<RepoCoordinates> {
        let global = self.context.global();
        let (Some(owner), Some(project)) =
            (global.get_str("repo.owner"), global.get_str("repo.project"))
        else {
            return Err(PluginError::Config(format!(
                "{}: cannot determine the repository from the git remote",
                self.ns()
            )));
        };

        let host = self
            .options
            .host
            .clone()
            .or_else(|| global.get_str("repo.host"))
            .unwrap_or_else(|| self.host.default_host().to_string());
        let api_url = self
            .options
            .api_url
            .clone()
            .unwrap_or_else(|| self.host.api_url(&host));

        Ok(RepoCoordinates {
            host,
            api_url,
            owner,
            project,
            token: self.token()?,
            timeout: Duration::from_millis(self.options.timeout_ms),
        })
    }

    fn api(&mut self) -> PluginResult<Arc<dyn ReleaseApi>> {
        if let Some(api) = &self.api {
            return Ok(Arc::clone(api));
        }
        let coordinates = self.coordinates()?;
        debug!(repository = %coordinates.repository(), api = %coordinates.api_url, "connecting");
        let api = self.provider.connect(&coordinates)?;
        self.api = Some(Arc::clone(&api));
        Ok(api)
    }

    async fn check_collaborator(&self, api: &dyn ReleaseApi) -> PluginResult<()> {
        let Some(check) = api.collaborator_check() else {
            debug!(host = %self.host, "collaborator check not supported");
            return Ok(());
        };

        let user = self
            .retry
            .run("authenticated user", move || check.authenticated_user())
            .await?;
        let allowed = self
            .retry
            .run("collaborator check", || check.is_collaborator(&user))
            .await?;
        if !allowed {
            let repository = self.context.global().get_str("repo.repository");
            return Err(PluginError::Precondition(format!(
                "user {user} is not a collaborator for {}",
                repository.unwrap_or_default()
            )));
        }

        debug!(%user, "collaborator verified");
        self.context.set_context(json!({ "username": user }));
        Ok(())
    }

    fn draft(&self) -> ReleaseDraft {
        let global = self.context.global().snapshot();
        let tag_name = global
            .get("tagName")
            .or_else(|| global.get("version"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let pre_release = self.options.pre_release.unwrap_or_else(|| {
            global
                .get("isPreRelease")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });

        ReleaseDraft {
            tag_name,
            name: template::render(&self.options.release_name, &global),
            notes: template::render(&self.options.release_notes, &global),
            draft: self.options.draft,
            pre_release,
        }
    }

    /// The release a dry run reports: the tag as id, the host's web URL.
    fn simulated_release(&self, draft: &ReleaseDraft) -> PluginResult<RemoteRelease> {
        let coordinates = self.coordinates()?;
        Ok(RemoteRelease {
            id: draft.tag_name.clone(),
            url: self.host.release_url(
                &coordinates.host,
                &coordinates.repository(),
                &draft.tag_name,
            ),
        })
    }

    async fn publish(
        &self,
        api: &dyn ReleaseApi,
        draft: &ReleaseDraft,
        simulated: &RemoteRelease,
    ) -> PluginResult<RemoteRelease> {
        let dry_run = self.services.dry_run;
        if self.options.update {
            let existing = self
                .retry
                .run_or_simulate(
                    dry_run,
                    "find release",
                    || api.find_release(&draft.tag_name),
                    || None,
                )
                .await?;
            if let Some(existing) = existing {
                info!(tag = %draft.tag_name, "updating existing release");
                return Ok(self
                    .retry
                    .run_or_simulate(
                        dry_run,
                        "update release",
                        || api.update_release(&existing, draft),
                        || existing.clone(),
                    )
                    .await?);
            }
        }

        Ok(self
            .retry
            .run_or_simulate(
                dry_run,
                "create release",
                || api.create_release(draft),
                || simulated.clone(),
            )
            .await?)
    }

    async fn upload_assets(&self, api: &dyn ReleaseApi, release: &RemoteRelease) -> PluginResult<()> {
        if self.options.assets.is_empty() {
            return Ok(());
        }
        let Some(upload) = api.asset_upload() else {
            let message = format!("{} does not support release assets", self.host);
            warn!("{message}");
            self.context.push_warning(message);
            return Ok(());
        };

        for asset in &self.options.assets {
            let path: PathBuf = self.services.cwd.join(asset);
            tokio::fs::metadata(&path).await?;
            let url = self
                .retry
                .run_or_simulate(
                    self.services.dry_run,
                    "upload asset",
                    || upload.upload_asset(release, &path),
                    || path.display().to_string(),
                )
                .await?;
            info!(%asset, %url, "uploaded asset");
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for RemoteReleasePlugin {
    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn handles(&self, phase: Phase) -> bool {
        matches!(phase, Phase::Init | Phase::Release)
    }

    async fn init(&mut self) -> PluginResult<Step> {
        let api = self.api()?;
        if self.options.skip_checks {
            debug!(namespace = self.ns(), "skipping checks");
            return Ok(Step::Executed);
        }
        self.check_collaborator(&*api).await?;
        Ok(Step::Executed)
    }

    async fn release(&mut self) -> PluginResult<Step> {
        let draft = self.draft();
        let api = self.api()?;
        let simulated = self.simulated_release(&draft)?;

        let release = self.publish(&*api, &draft, &simulated).await?;
        info!(
            url = %release.url,
            tag = %draft.tag_name,
            pre_release = draft.pre_release,
            dry_run = self.services.dry_run,
            "{} release published",
            self.host
        );
        self.context.set_context(json!({
            "isReleased": true,
            "releaseUrl": release.url,
            "releaseId": release.id,
        }));

        self.upload_assets(&*api, &release).await?;
        Ok(Step::Executed)
    }
}

/// Factory for [`RemoteReleasePlugin`]. Enabled when `release` is set.
pub struct RemoteReleaseFactory {
    host: Host,
    provider: Arc<dyn ReleaseApiProvider>,
    env: EnvLookup,
}

impl RemoteReleaseFactory {
    /// Creates a factory with a custom API provider.
    #[must_use]
    pub fn new(host: Host, provider: Arc<dyn ReleaseApiProvider>) -> Self {
        Self {
            host,
            provider,
            env: process_env,
        }
    }

    /// Factory for GitHub with the REST client.
    #[must_use]
    pub fn github() -> Self {
        Self::new(Host::GitHub, Arc::new(Host::GitHub))
    }

    /// Factory for GitLab with the REST client.
    #[must_use]
    pub fn gitlab() -> Self {
        Self::new(Host::GitLab, Arc::new(Host::GitLab))
    }

    /// Replaces the environment lookup used for tokens.
    #[must_use]
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Returns the host this factory serves.
    #[must_use]
    pub fn host(&self) -> Host {
        self.host
    }
}

impl PluginFactory for RemoteReleaseFactory {
    fn is_enabled(&self, setup: &PluginSetup) -> bool {
        setup
            .context()
            .options_as::<RemoteReleaseConfig>()
            .is_ok_and(|options| options.release)
    }

    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
        let plugin = RemoteReleasePlugin::new(setup, self.host, Arc::clone(&self.provider))?
            .with_env_lookup(self.env);
        Ok(Box::new(plugin))
    }
}
