//! Configuration schema.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigResult;

/// Namespaces of the built-in plugins, in registration order.
pub const BUILTIN_NAMESPACES: [&str; 5] = ["npm", "git", "github", "gitlab", "version"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Unattended mode. `None` defers to the `CI` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci: Option<bool>,

    /// Log side effects instead of performing them.
    pub dry_run: bool,

    /// Requested increment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<IncrementSetting>,

    /// Pre-release mode, optionally carrying the identifier.
    pub pre_release: PreReleaseSetting,

    /// Base number of a fresh pre-release series (`0` or `1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_release_base: Option<String>,

    /// Hook commands keyed by `<before|after>:[<namespace>:]<phase>`.
    pub hooks: BTreeMap<String, HookCommand>,

    /// Third-party plugins keyed by name, with their options, in
    /// declaration order.
    pub plugins: IndexMap<String, Value>,

    /// Version plugin configuration.
    pub version: VersionConfig,

    /// Git plugin configuration.
    pub git: GitConfig,

    /// npm plugin configuration.
    pub npm: NpmConfig,

    /// GitHub release plugin configuration.
    pub github: RemoteReleaseConfig,

    /// GitLab release plugin configuration.
    pub gitlab: RemoteReleaseConfig,
}

impl Config {
    /// Returns the frozen options for a plugin namespace.
    ///
    /// Built-in namespaces come from their typed tables, anything else from
    /// the `[plugins]` table. Unknown namespaces yield an empty object.
    pub fn namespace_options(&self, namespace: &str) -> ConfigResult<Value> {
        let value = match namespace {
            "version" => serde_json::to_value(&self.version)?,
            "git" => serde_json::to_value(&self.git)?,
            "npm" => serde_json::to_value(&self.npm)?,
            "github" => serde_json::to_value(&self.github)?,
            "gitlab" => serde_json::to_value(&self.gitlab)?,
            other => self
                .plugins
                .get(other)
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        };
        Ok(value)
    }
}

/// The `increment` setting: `false` for "no bump", or a release type or
/// explicit version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncrementSetting {
    /// `false` disables bumping; `true` is treated as unset.
    Flag(bool),
    /// A release type (`minor`) or version (`2.0.0`).
    Value(String),
}

/// The `pre-release` setting: a flag or the pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreReleaseSetting {
    /// Plain on/off switch.
    Flag(bool),
    /// Enabled, with the given identifier (`beta`).
    Id(String),
}

impl Default for PreReleaseSetting {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl PreReleaseSetting {
    /// Returns whether pre-release mode is requested.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Id(_) => true,
        }
    }

    /// Returns the pre-release identifier, if one was given.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Flag(_) => None,
            Self::Id(id) => Some(id.as_str()),
        }
    }
}

/// A hook: one command or a sequence of commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookCommand {
    /// A single shell command.
    One(String),
    /// Several commands run in order.
    Many(Vec<String>),
}

impl HookCommand {
    /// Returns the commands in execution order.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        match self {
            Self::One(command) => vec![command.as_str()],
            Self::Many(commands) => commands.iter().map(String::as_str).collect(),
        }
    }
}

/// Version plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VersionConfig {
    /// Offer pre-release choices in the interactive prompt.
    pub prompt_pre_release: bool,
}

/// Git plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitConfig {
    /// Create the release commit.
    pub commit: bool,
    /// Commit message template.
    pub commit_message: String,
    /// Create the release tag.
    pub tag: bool,
    /// Tag name template.
    pub tag_name: String,
    /// Tag annotation template.
    pub tag_annotation: String,
    /// Push commit and tag.
    pub push: bool,
    /// Remote to push to.
    pub push_repo: String,
    /// Extra `git push` arguments.
    pub push_args: Vec<String>,
    /// Refuse to start with uncommitted changes.
    pub require_clean_working_dir: bool,
    /// Allowed branches. Empty allows any.
    pub require_branch: Vec<String>,
    /// Require an upstream for the current branch.
    pub require_upstream: bool,
    /// Require at least one commit since the latest tag.
    pub require_commits: bool,
    /// Produce the changelog from commits since the latest tag.
    pub changelog: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            commit: true,
            commit_message: default_release_template(),
            tag: true,
            tag_name: "${version}".to_string(),
            tag_annotation: default_release_template(),
            push: true,
            push_repo: "origin".to_string(),
            push_args: vec!["--follow-tags".to_string()],
            require_clean_working_dir: true,
            require_branch: Vec::new(),
            require_upstream: true,
            require_commits: false,
            changelog: true,
        }
    }
}

/// npm plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NpmConfig {
    /// Publish the package.
    pub publish: bool,
    /// Dist tag for stable releases.
    pub tag: String,
    /// Package access (`public` or `restricted`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Directory passed to `npm publish`.
    pub publish_path: String,
    /// Registry to publish to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Skip the authentication check.
    pub skip_checks: bool,
    /// Leave `package.json` untouched.
    pub ignore_version: bool,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            publish: false,
            tag: "latest".to_string(),
            access: None,
            publish_path: ".".to_string(),
            registry: None,
            skip_checks: false,
            ignore_version: false,
        }
    }
}

/// Remote release (GitHub, GitLab) plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoteReleaseConfig {
    /// Create a release on the host.
    pub release: bool,
    /// Release title template.
    pub release_name: String,
    /// Release body template.
    pub release_notes: String,
    /// Create the release as a draft.
    pub draft: bool,
    /// Mark as pre-release. `None` follows the run's pre-release mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_release: Option<bool>,
    /// Files to upload as release assets.
    pub assets: Vec<String>,
    /// Environment variable holding the API token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ref: Option<String>,
    /// Web host, when not derived from the git remote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// API base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Skip authentication and collaborator checks.
    pub skip_checks: bool,
    /// Update the existing release for the tag instead of failing.
    pub update: bool,
    /// Connect and request timeout for API calls, in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy for API calls.
    pub retry: RetryConfig,
}

impl Default for RemoteReleaseConfig {
    fn default() -> Self {
        Self {
            release: false,
            release_name: default_release_template(),
            release_notes: "${changelog}".to_string(),
            draft: false,
            pre_release: None,
            assets: Vec::new(),
            token_ref: None,
            host: None,
            api_url: None,
            skip_checks: false,
            update: false,
            timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub min_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            min_timeout_ms: 1000,
        }
    }
}

fn default_release_template() -> String {
    "Release ${version}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.ci.is_none());
        assert!(!config.dry_run);
        assert!(config.increment.is_none());
        assert!(!config.pre_release.is_enabled());
        assert!(config.hooks.is_empty());
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_default_git_config() {
        let config = GitConfig::default();
        assert!(config.commit);
        assert_eq!(config.commit_message, "Release ${version}");
        assert_eq!(config.tag_name, "${version}");
        assert_eq!(config.push_repo, "origin");
        assert_eq!(config.push_args, vec!["--follow-tags".to_string()]);
        assert!(config.require_clean_working_dir);
        assert!(config.require_upstream);
        assert!(!config.require_commits);
    }

    #[test]
    fn test_default_npm_config() {
        let config = NpmConfig::default();
        assert!(!config.publish);
        assert_eq!(config.tag, "latest");
        assert_eq!(config.publish_path, ".");
    }

    #[test]
    fn test_default_remote_release_config() {
        let config = RemoteReleaseConfig::default();
        assert!(!config.release);
        assert_eq!(config.release_notes, "${changelog}");
        assert_eq!(config.retry.retries, 2);
        assert_eq!(config.retry.min_timeout_ms, 1000);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r##"
            ci = true
            dry-run = true
            increment = "minor"
            pre-release = "beta"
            pre-release-base = "1"

            [hooks]
            "before:init" = "cargo test"
            "after:git:release" = ["echo one", "echo two"]

            [git]
            require-branch = ["main"]
            push = false

            [npm]
            publish = true
            access = "public"

            [github]
            release = true
            assets = ["dist/*.zip"]

            [github.retry]
            retries = 5

            [plugins.slack]
            channel = "#releases"
        "##;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ci, Some(true));
        assert!(config.dry_run);
        assert_eq!(
            config.increment,
            Some(IncrementSetting::Value("minor".to_string()))
        );
        assert_eq!(config.pre_release.id(), Some("beta"));
        assert_eq!(config.pre_release_base.as_deref(), Some("1"));
        assert_eq!(config.hooks["before:init"].commands(), vec!["cargo test"]);
        assert_eq!(
            config.hooks["after:git:release"].commands(),
            vec!["echo one", "echo two"]
        );
        assert_eq!(config.git.require_branch, vec!["main".to_string()]);
        assert!(!config.git.push);
        assert!(config.git.tag);
        assert!(config.npm.publish);
        assert!(config.github.release);
        assert_eq!(config.github.retry.retries, 5);
        assert_eq!(config.github.retry.min_timeout_ms, 1000);
        assert!(!config.gitlab.release);
        assert_eq!(config.plugins["slack"], json!({"channel": "#releases"}));
    }

    #[test]
    fn test_increment_false() {
        let config: Config = toml::from_str("increment = false").unwrap();
        assert_eq!(config.increment, Some(IncrementSetting::Flag(false)));
    }

    #[test]
    fn test_pre_release_flag() {
        let config: Config = toml::from_str("pre-release = true").unwrap();
        assert!(config.pre_release.is_enabled());
        assert!(config.pre_release.id().is_none());
    }

    #[test]
    fn test_namespace_options_builtin() {
        let config = Config::default();
        let options = config.namespace_options("git").unwrap();
        assert_eq!(options["tag-name"], json!("${version}"));
        assert_eq!(options["push-repo"], json!("origin"));
    }

    #[test]
    fn test_namespace_options_third_party() {
        let mut config = Config::default();
        config
            .plugins
            .insert("slack".to_string(), json!({"channel": "#releases"}));
        assert_eq!(
            config.namespace_options("slack").unwrap(),
            json!({"channel": "#releases"})
        );
        assert_eq!(config.namespace_options("unknown").unwrap(), json!({}));
    }
}
