//! Configuration management for Shipwright.
//!
//! This crate loads `.shipwright.toml`, layers it over the built-in defaults
//! and CLI overrides, and exposes the JSON deep-merge rules shared with the
//! run-time context.

mod error;
mod loader;
pub mod merge;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_FILE_NAME, DEFAULT_CONFIG_TEMPLATE, find_and_load_config_from, find_config_file_from,
    load_config, read_layer, resolve_config, write_default_config,
};
pub use schema::{
    BUILTIN_NAMESPACES, Config, GitConfig, HookCommand, IncrementSetting, NpmConfig,
    PreReleaseSetting, RemoteReleaseConfig, RetryConfig, VersionConfig,
};
