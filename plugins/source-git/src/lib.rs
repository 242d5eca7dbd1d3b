//! Git source-control plugin.
//!
//! Checks repository preconditions, derives the latest version from tags,
//! builds a changelog from commit subjects, and commits, tags and pushes the
//! release. Local reads and mutations go through `git2`; the push goes
//! through the shell so credential helpers apply.
//!
//! Commit and tag are covered by a [`RollbackGuard`] from `beforeRelease`
//! until the push starts. The guard is never armed when `release` has
//! nothing to do.

mod remote;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use serde_json::json;
use shipwright_config::GitConfig;
use shipwright_core::RollbackGuard;
use shipwright_git::{Repository, ResetTarget};
use shipwright_plugin::{
    ExecOptions, Phase, Plugin, PluginContext, PluginError, PluginFactory, PluginResult,
    PluginSetup, Services, ShellCommand, Step, template,
};
use tracing::{debug, info, warn};

pub use remote::{RemoteRepo, parse_remote_url};

/// Built-in plugin owning the `git` namespace.
pub struct GitPlugin {
    context: PluginContext,
    services: Services,
    options: GitConfig,
    root: PathBuf,
    guard: RollbackGuard,
}

impl GitPlugin {
    /// Creates the plugin for the repository containing the working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or there is no
    /// repository.
    pub fn new(setup: PluginSetup) -> PluginResult<Self> {
        let context = setup.context();
        let options = context
            .options_as()
            .map_err(|e| PluginError::Config(format!("git: {e}")))?;
        let root = Repository::discover(&setup.services.cwd)?.root();
        let guard = RollbackGuard::new(undo(root.clone(), context.clone()));

        Ok(Self {
            context,
            services: setup.services,
            options,
            root,
            guard,
        })
    }

    fn repo(&self) -> PluginResult<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    fn render(&self, template: &str) -> String {
        template::render(template, &self.context.global().snapshot())
    }

    /// Tag prefix: the tag-name template up to `${version}`, rendered.
    fn tag_prefix(&self) -> String {
        let head = self
            .options
            .tag_name
            .split("${version}")
            .next()
            .unwrap_or_default();
        self.render(head)
    }

    /// Whether `release` has any local or remote work to do.
    fn releases(&self) -> bool {
        self.options.commit || self.options.tag || self.options.push
    }

    fn check_preconditions(&self) -> PluginResult<()> {
        let repo = self.repo()?;

        if self.options.require_clean_working_dir && !repo.is_clean()? {
            return Err(PluginError::Precondition(
                "working dir must be clean".to_string(),
            ));
        }

        if !self.options.require_branch.is_empty() {
            let branch = repo.current_branch().unwrap_or_default();
            if !self.options.require_branch.contains(&branch) {
                return Err(PluginError::Precondition(format!(
                    "must be on branch {} (currently on `{branch}`)",
                    self.options.require_branch.join(", ")
                )));
            }
        }

        if self.options.push && self.options.require_upstream && repo.upstream().is_none() {
            return Err(PluginError::Precondition(
                "no upstream configured for current branch".to_string(),
            ));
        }

        if self.options.require_commits {
            let latest = repo.latest_version_tag(&self.tag_prefix())?;
            if repo.commits_since(latest.as_deref())?.is_empty() {
                return Err(PluginError::Precondition(
                    "no commits since latest tag".to_string(),
                ));
            }
        }

        if let Some(url) = repo.remote_url(&self.options.push_repo) {
            match parse_remote_url(&url) {
                Some(coordinates) => {
                    debug!(repository = %coordinates.repository, "remote repository");
                    self.context
                        .global()
                        .merge(json!({ "remoteUrl": url, "repo": coordinates }));
                }
                None => debug!(%url, "remote is not a hosted repository"),
            }
        }

        Ok(())
    }

    /// Commits and tags. Failures here are rolled back by the guard.
    fn commit_and_tag(&self) -> PluginResult<()> {
        let repo = self.repo()?;

        if self.options.commit {
            let message = self.render(&self.options.commit_message);
            let commit = repo
                .commit(&message)
                .map_err(|e| PluginError::LocalMutation(format!("commit failed: {e}")))?;
            match commit {
                Some(id) => {
                    info!(commit = %&id[..7], %message, "committed");
                    self.context.set_context(json!({ "isCommitted": true }));
                }
                None => {
                    warn!("nothing to commit");
                    self.context.push_warning("nothing to commit");
                }
            }
        }

        if self.options.tag {
            let name = self.context.get_str("tagName").unwrap_or_default();
            let annotation = self.render(&self.options.tag_annotation);
            repo.create_tag(&name, &annotation)
                .map_err(|e| PluginError::LocalMutation(format!("tag `{name}` failed: {e}")))?;
            info!(tag = %name, "tagged");
            self.context.set_context(json!({ "isTagged": true }));
        }

        Ok(())
    }

    async fn push(&self) -> PluginResult<()> {
        let mut args = vec!["git".to_string(), "push".to_string()];
        args.extend(self.options.push_args.iter().cloned());
        args.push(self.options.push_repo.clone());

        let Err(error) = self
            .services
            .shell
            .exec(&ShellCommand::Args(args), &ExecOptions::write())
            .await
        else {
            return Ok(());
        };

        if self.context.get_bool("isTagged") {
            let tag = self.context.get_str("tagName").unwrap_or_default();
            let delete = ShellCommand::args([
                "git".to_string(),
                "push".to_string(),
                self.options.push_repo.clone(),
                format!(":refs/tags/{tag}"),
            ]);
            if let Err(cleanup) = self
                .services
                .shell
                .exec(&delete, &ExecOptions::write())
                .await
            {
                warn!(%tag, error = %cleanup, "could not delete remote tag");
            }
        }

        Err(error.into())
    }
}

/// Undo action for the rollback guard.
///
/// Reads the recorded flags when it runs, so only mutations that actually
/// happened are undone.
fn undo(root: PathBuf, context: PluginContext) -> impl Fn() + Send + Sync + 'static {
    move || {
        if let Err(error) = restore(&root, &context) {
            warn!(%error, "rollback incomplete");
        }
    }
}

fn restore(root: &Path, context: &PluginContext) -> PluginResult<()> {
    let repo = Repository::open(root)?;

    if context.get_bool("isTagged")
        && let Some(tag) = context.get_str("tagName")
    {
        info!(%tag, "deleting local tag");
        if let Err(error) = repo.delete_tag(&tag) {
            warn!(%tag, %error, "could not delete local tag");
        }
    }

    let target = if context.get_bool("isCommitted") {
        ResetTarget::Parent
    } else {
        ResetTarget::Head
    };
    debug!(?target, "resetting");
    repo.reset_hard(target)?;

    context.set_context(json!({ "isTagged": false, "isCommitted": false }));
    Ok(())
}

#[async_trait]
impl Plugin for GitPlugin {
    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn handles(&self, phase: Phase) -> bool {
        match phase {
            Phase::Init | Phase::ResolveLatestVersion | Phase::BeforeRelease => true,
            Phase::ResolveIncrement => self.options.changelog,
            Phase::Bump => self.options.tag,
            Phase::Release => self.releases(),
            _ => false,
        }
    }

    async fn init(&mut self) -> PluginResult<Step> {
        self.check_preconditions()?;
        Ok(Step::Executed)
    }

    async fn get_latest_version(&mut self) -> PluginResult<Option<String>> {
        let prefix = self.tag_prefix();
        let Some(tag) = self.repo()?.latest_version_tag(&prefix)? else {
            debug!(%prefix, "no version tag");
            return Ok(None);
        };
        self.context.set_context(json!({ "latestTag": tag }));
        Ok(tag.strip_prefix(prefix.as_str()).map(String::from))
    }

    async fn get_changelog(&mut self, _latest_version: &Version) -> PluginResult<Option<String>> {
        let latest_tag = self.context.get_str("latestTag");
        let commits = self.repo()?.commits_since(latest_tag.as_deref())?;
        if commits.is_empty() {
            return Ok(None);
        }

        let changelog = commits
            .iter()
            .map(|c| format!("* {} ({})", c.subject, c.short_hash()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(changelog))
    }

    async fn bump(&mut self, _version: &Version) -> PluginResult<Step> {
        let tag_name = self.render(&self.options.tag_name);
        debug!(%tag_name, "tag name");
        self.context.set_context(json!({ "tagName": tag_name }));
        self.context.global().merge(json!({ "tagName": tag_name }));
        Ok(Step::Executed)
    }

    async fn before_release(&mut self) -> PluginResult<Step> {
        // Only `release` disarms the guard.
        if self.options.require_clean_working_dir && self.releases() {
            self.guard.arm();
        }
        if self.services.dry_run {
            info!(dry_run = true, "skipping git add");
            return Ok(Step::Executed);
        }
        self.repo()?.stage_tracked()?;
        Ok(Step::Executed)
    }

    async fn release(&mut self) -> PluginResult<Step> {
        if self.services.dry_run {
            info!(
                dry_run = true,
                commit = self.options.commit,
                tag = ?self.context.get_str("tagName"),
                "skipping git commit and tag"
            );
        } else {
            self.commit_and_tag()?;
        }

        self.guard.disarm();

        if self.options.push {
            self.push().await?;
        }

        self.context.set_context(json!({ "isReleased": true }));
        Ok(Step::Executed)
    }

    async fn rollback(&mut self) -> PluginResult<()> {
        self.guard.trigger();
        Ok(())
    }
}

/// Factory for [`GitPlugin`]. Enabled inside a git repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitPluginFactory;

impl PluginFactory for GitPluginFactory {
    fn is_enabled(&self, setup: &PluginSetup) -> bool {
        Repository::discover(&setup.services.cwd).is_ok()
    }

    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
        Ok(Box::new(GitPlugin::new(setup)?))
    }
}
