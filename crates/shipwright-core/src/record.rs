//! Release record produced by a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;

/// Outcome of one remote target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    /// Whether the target acknowledged the release.
    pub is_released: bool,
    /// Where the release can be found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
}

/// Facts accumulated over a completed release run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Project name, if any plugin reported one.
    pub name: Option<String>,
    /// Version before the release.
    pub latest_version: Version,
    /// Released version.
    pub version: Version,
    /// Whether the release is a pre-release.
    pub is_pre_release: bool,
    /// Pre-release identifier.
    pub pre_release_id: Option<String>,
    /// Rendered tag name.
    pub tag_name: Option<String>,
    /// Changelog since the previous release.
    pub changelog: Option<String>,
    /// Per-namespace outcome of every plugin that handled `release`.
    pub targets: BTreeMap<String, TargetStatus>,
    /// Non-fatal problems met during the run.
    pub warnings: Vec<String>,
    /// Completion time.
    pub finished_at: DateTime<Utc>,
}

impl ReleaseRecord {
    /// Returns whether every target acknowledged the release.
    #[must_use]
    pub fn all_released(&self) -> bool {
        self.targets.values().all(|t| t.is_released)
    }
}
