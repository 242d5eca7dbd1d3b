//! Configuration loader.
//!
//! Layers are resolved as JSON values and merged in increasing precedence:
//! built-in defaults, then the configuration file, then CLI overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::merge::deep_merge;
use crate::{Config, ConfigError, ConfigResult};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".shipwright.toml";

/// Template written by `shipwright init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Shipwright release configuration.
# Every key is optional; the values below are the built-in defaults.

# increment = "patch"        # release type, explicit version, or false
# pre-release = false        # true, or an identifier such as "beta"
# dry-run = false

[hooks]
# "before:init" = "cargo test"
# "after:release" = "echo Released ${name} ${version}"

[git]
commit = true
commit-message = "Release ${version}"
tag = true
tag-name = "${version}"
tag-annotation = "Release ${version}"
push = true
push-repo = "origin"
push-args = ["--follow-tags"]
require-clean-working-dir = true
require-branch = []
require-upstream = true
require-commits = false
changelog = true

[npm]
publish = false
tag = "latest"
publish-path = "."

[github]
release = false
release-name = "Release ${version}"
release-notes = "${changelog}"
# token-ref = "GITHUB_TOKEN"

[gitlab]
release = false
release-name = "Release ${version}"
release-notes = "${changelog}"
# token-ref = "GITLAB_TOKEN"
"#;

/// Reads a configuration file as an untyped layer.
///
/// # Errors
///
/// Returns an error if the file does not exist or is not valid TOML.
pub fn read_layer(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    debug!(?path, "reading configuration layer");

    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let layer: Value = toml::from_str(&content)?;
    Ok(layer)
}

/// Resolves the final configuration from the file layer and CLI overrides.
///
/// # Errors
///
/// Returns an error if the merged value does not fit the schema.
pub fn resolve_config(file: Option<Value>, overrides: Value) -> ConfigResult<Config> {
    let mut merged = serde_json::to_value(Config::default())?;
    if let Some(file) = file {
        deep_merge(&mut merged, file);
    }
    deep_merge(&mut merged, overrides);
    Ok(serde_json::from_value(merged)?)
}

/// Loads configuration from the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let layer = read_layer(path)?;
    resolve_config(Some(layer), Value::Object(serde_json::Map::new()))
}

/// Finds the configuration file starting from the given directory.
///
/// Walks up the directory tree until a configuration file is found.
#[must_use]
pub fn find_config_file_from(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut dir = start_dir.as_ref();

    loop {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => return None,
        }
    }
}

/// Finds and loads configuration starting from the given directory.
///
/// A missing file is not an error: the built-in defaults apply.
///
/// # Errors
///
/// Returns an error if a configuration file exists but cannot be parsed.
pub fn find_and_load_config_from(start_dir: impl AsRef<Path>) -> ConfigResult<Config> {
    match find_config_file_from(start_dir) {
        Some(path) => load_config(path),
        None => {
            debug!("no configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Writes the default configuration template into `dir`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or if it
/// cannot be written.
pub fn write_default_config(dir: impl AsRef<Path>, force: bool) -> ConfigResult<PathBuf> {
    let path = dir.as_ref().join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path));
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
    debug!(?path, "wrote default configuration");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_name() {
        assert_eq!(CONFIG_FILE_NAME, ".shipwright.toml");
    }

    #[test]
    fn test_load_config_not_found() {
        let result = load_config("/nonexistent/path/.shipwright.toml");
        match result {
            Err(ConfigError::NotFound(path)) => {
                assert!(path.to_string_lossy().contains(".shipwright.toml"));
            }
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::InvalidToml(_))));
    }

    #[test]
    fn test_load_config_schema_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[git]\npush = \"sometimes\"\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_load_config_keeps_unset_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[git]\npush = false\n").unwrap();

        let config = load_config(&config_path).unwrap();
        assert!(!config.git.push);
        assert!(config.git.commit);
        assert_eq!(config.git.tag_name, "${version}");
    }

    #[test]
    fn test_resolve_config_override_precedence() {
        let file = json!({"increment": "patch", "git": {"push": false}});
        let overrides = json!({"increment": "major", "dry-run": true});

        let config = resolve_config(Some(file), overrides).unwrap();
        assert_eq!(
            config.increment,
            Some(crate::IncrementSetting::Value("major".to_string()))
        );
        assert!(config.dry_run);
        assert!(!config.git.push);
    }

    #[test]
    fn test_plugins_keep_declaration_order() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            "[plugins.zeta]\nlevel = 1\n\n[plugins.alpha]\n\n[plugins.mid]\n",
        )
        .unwrap();

        let layer = read_layer(&config_path).unwrap();
        let config = resolve_config(Some(layer), json!({"plugins": {"beta": {}}})).unwrap();
        let names: Vec<&str> = config.plugins.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha", "mid", "beta"]);
    }

    #[test]
    fn test_resolve_config_without_file() {
        let config = resolve_config(None, json!({})).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_find_and_load_config_in_parent() {
        let parent_dir = TempDir::new().unwrap();
        fs::write(
            parent_dir.path().join(CONFIG_FILE_NAME),
            "increment = \"minor\"\n",
        )
        .unwrap();

        let child_dir = parent_dir.path().join("subdir");
        fs::create_dir(&child_dir).unwrap();

        let config = find_and_load_config_from(&child_dir).unwrap();
        assert_eq!(
            config.increment,
            Some(crate::IncrementSetting::Value("minor".to_string()))
        );
    }

    #[test]
    fn test_find_config_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        // Nothing above a fresh temp dir is expected to carry the file.
        let found = find_config_file_from(temp_dir.path());
        assert!(found.is_none_or(|path| !path.starts_with(temp_dir.path())));
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_write_default_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_default_config(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        let again = write_default_config(temp_dir.path(), false);
        assert!(matches!(again, Err(ConfigError::AlreadyExists(_))));

        assert!(write_default_config(temp_dir.path(), true).is_ok());
    }
}
