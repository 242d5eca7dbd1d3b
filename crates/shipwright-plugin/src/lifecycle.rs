//! Release lifecycle phases.

use std::fmt;

/// One step of the release lifecycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Precondition checks and setup.
    Init,
    /// Project name.
    ResolveName,
    /// Latest released version.
    ResolveLatestVersion,
    /// Requested or recommended increment.
    ResolveIncrement,
    /// Next version.
    ResolveVersion,
    /// Last chance before files change.
    BeforeBump,
    /// Write the new version.
    Bump,
    /// Prepare local mutations.
    BeforeRelease,
    /// Commit, tag, push, publish.
    Release,
    /// Reporting after a completed release.
    AfterRelease,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Self; 10] = [
        Self::Init,
        Self::ResolveName,
        Self::ResolveLatestVersion,
        Self::ResolveIncrement,
        Self::ResolveVersion,
        Self::BeforeBump,
        Self::Bump,
        Self::BeforeRelease,
        Self::Release,
        Self::AfterRelease,
    ];

    /// Name used in hook keys (`before:<name>`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ResolveName => "resolveName",
            Self::ResolveLatestVersion => "resolveLatestVersion",
            Self::ResolveIncrement => "resolveIncrement",
            Self::ResolveVersion => "resolveVersion",
            Self::BeforeBump => "beforeBump",
            Self::Bump => "bump",
            Self::BeforeRelease => "beforeRelease",
            Self::Release => "release",
            Self::AfterRelease => "afterRelease",
        }
    }

    /// Returns whether a failure in this phase triggers rollback.
    #[must_use]
    pub fn rolls_back_on_failure(self) -> bool {
        (Self::BeforeBump..=Self::Release).contains(&self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a side-effecting lifecycle method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The method did its work; `after:` hooks fire.
    Executed,
    /// Nothing was done; `after:` hooks stay silent.
    Skipped,
}

impl Step {
    /// Returns whether the method did its work.
    #[must_use]
    pub fn is_executed(self) -> bool {
        self == Self::Executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
    }

    #[test]
    fn test_phase_names() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.as_str()).collect();
        insta::assert_snapshot!(names.join(" → "), @"init → resolveName → resolveLatestVersion → resolveIncrement → resolveVersion → beforeBump → bump → beforeRelease → release → afterRelease");
    }

    #[test]
    fn test_rollback_window() {
        assert!(!Phase::Init.rolls_back_on_failure());
        assert!(!Phase::ResolveVersion.rolls_back_on_failure());
        assert!(Phase::BeforeBump.rolls_back_on_failure());
        assert!(Phase::Release.rolls_back_on_failure());
        assert!(!Phase::AfterRelease.rolls_back_on_failure());
    }
}
