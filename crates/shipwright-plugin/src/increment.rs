//! Increment requests handed to version-capable plugins.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use shipwright_config::IncrementSetting;

/// A semantic-version release type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseType {
    /// `1.2.3` → `2.0.0`
    Major,
    /// `1.2.3` → `1.3.0`
    Minor,
    /// `1.2.3` → `1.2.4`
    Patch,
    /// `1.2.3` → `2.0.0-<id>.0`
    PreMajor,
    /// `1.2.3` → `1.3.0-<id>.0`
    PreMinor,
    /// `1.2.3` → `1.2.4-<id>.0`
    PrePatch,
    /// Continue or start a pre-release series.
    PreRelease,
}

impl ReleaseType {
    /// All release types, stable ones first.
    pub const ALL: [Self; 7] = [
        Self::Patch,
        Self::Minor,
        Self::Major,
        Self::PrePatch,
        Self::PreMinor,
        Self::PreMajor,
        Self::PreRelease,
    ];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::PreMajor => "premajor",
            Self::PreMinor => "preminor",
            Self::PrePatch => "prepatch",
            Self::PreRelease => "prerelease",
        }
    }

    /// Returns whether the type produces a pre-release version.
    #[must_use]
    pub fn is_pre(self) -> bool {
        matches!(
            self,
            Self::PreMajor | Self::PreMinor | Self::PrePatch | Self::PreRelease
        )
    }

    /// Maps `major`/`minor`/`patch` to their `pre*` counterpart.
    #[must_use]
    pub fn to_pre(self) -> Self {
        match self {
            Self::Major => Self::PreMajor,
            Self::Minor => Self::PreMinor,
            Self::Patch => Self::PrePatch,
            other => other,
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "premajor" => Ok(Self::PreMajor),
            "preminor" => Ok(Self::PreMinor),
            "prepatch" => Ok(Self::PrePatch),
            "prerelease" | "pre" => Ok(Self::PreRelease),
            other => Err(format!("unknown release type: {other}")),
        }
    }
}

/// The requested increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Increment {
    /// Keep the latest version (`increment = false`).
    NoBump,
    /// Bump by release type.
    Type(ReleaseType),
    /// An explicit version, possibly needing coercion (`"1.2"`).
    Explicit(String),
}

impl Increment {
    /// Parses a release type name, falling back to an explicit version.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value
            .parse::<ReleaseType>()
            .map_or_else(|_| Self::Explicit(value.to_string()), Self::Type)
    }

    /// Converts the configuration setting. `true` counts as unset.
    #[must_use]
    pub fn from_setting(setting: &IncrementSetting) -> Option<Self> {
        match setting {
            IncrementSetting::Flag(false) => Some(Self::NoBump),
            IncrementSetting::Flag(true) => None,
            IncrementSetting::Value(value) => Some(Self::parse(value)),
        }
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBump => f.write_str("false"),
            Self::Type(t) => t.fmt(f),
            Self::Explicit(v) => f.write_str(v),
        }
    }
}

/// Inputs of the version phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequest {
    /// Latest released version (`0.0.0` when none).
    pub latest_version: Version,
    /// Requested increment, if any.
    pub increment: Option<Increment>,
    /// Pre-release mode.
    pub is_pre_release: bool,
    /// Pre-release identifier (`beta`).
    pub pre_release_id: Option<String>,
    /// Base of a fresh pre-release counter (`0` or `1`).
    pub pre_release_base: Option<String>,
    /// Unattended run.
    pub ci: bool,
}

impl VersionRequest {
    /// Creates a request with no increment and pre-release mode off.
    #[must_use]
    pub fn new(latest_version: Version) -> Self {
        Self {
            latest_version,
            increment: None,
            is_pre_release: false,
            pre_release_id: None,
            pre_release_base: None,
            ci: false,
        }
    }

    /// Sets the increment.
    #[must_use]
    pub fn with_increment(mut self, increment: Increment) -> Self {
        self.increment = Some(increment);
        self
    }

    /// Enables pre-release mode with an optional identifier.
    #[must_use]
    pub fn with_pre_release(mut self, id: Option<&str>) -> Self {
        self.is_pre_release = true;
        self.pre_release_id = id.map(String::from);
        self
    }

    /// Sets the pre-release base.
    #[must_use]
    pub fn with_pre_release_base(mut self, base: impl Into<String>) -> Self {
        self.pre_release_base = Some(base.into());
        self
    }

    /// Marks the request as unattended.
    #[must_use]
    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_types() {
        assert_eq!(Increment::parse("minor"), Increment::Type(ReleaseType::Minor));
        assert_eq!(Increment::parse("MAJOR"), Increment::Type(ReleaseType::Major));
        assert_eq!(
            Increment::parse("pre"),
            Increment::Type(ReleaseType::PreRelease)
        );
    }

    #[test]
    fn test_parse_explicit() {
        assert_eq!(
            Increment::parse("2.5.0"),
            Increment::Explicit("2.5.0".to_string())
        );
    }

    #[test]
    fn test_from_setting() {
        assert_eq!(
            Increment::from_setting(&IncrementSetting::Flag(false)),
            Some(Increment::NoBump)
        );
        assert_eq!(Increment::from_setting(&IncrementSetting::Flag(true)), None);
        assert_eq!(
            Increment::from_setting(&IncrementSetting::Value("patch".to_string())),
            Some(Increment::Type(ReleaseType::Patch))
        );
    }

    #[test]
    fn test_to_pre() {
        assert_eq!(ReleaseType::Patch.to_pre(), ReleaseType::PrePatch);
        assert_eq!(ReleaseType::Major.to_pre(), ReleaseType::PreMajor);
        assert_eq!(ReleaseType::PreRelease.to_pre(), ReleaseType::PreRelease);
        assert!(ReleaseType::PreMinor.is_pre());
        assert!(!ReleaseType::Minor.is_pre());
    }

    #[test]
    fn test_request_builder() {
        let request = VersionRequest::new(Version::new(1, 0, 0))
            .with_increment(Increment::Type(ReleaseType::Minor))
            .with_pre_release(Some("beta"))
            .with_ci(true);
        assert!(request.is_pre_release);
        assert_eq!(request.pre_release_id.as_deref(), Some("beta"));
        assert!(request.ci);
    }
}
