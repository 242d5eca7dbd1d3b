//! Next-version resolution.

use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use shipwright_plugin::{Increment, ReleaseType, VersionRequest};

static COERCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,16})(?:\.(\d{1,16}))?(?:\.(\d{1,16}))?").expect("invalid regex")
});

/// A resolved version plus anything the operator should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The next version.
    pub version: Version,
    /// Non-fatal notices, such as a coerced input.
    pub warnings: Vec<String>,
}

impl Resolution {
    fn exact(version: Version) -> Self {
        Self {
            version,
            warnings: Vec::new(),
        }
    }
}

/// Computes the next release version.
///
/// Rules are tried in order and the first match wins:
/// 1. `increment = false` keeps the latest version.
/// 2. An explicit version strictly greater than the latest is used as is.
/// 3. Pre-release mode on a pre-release with no increment continues the
///    series.
/// 4. Unattended runs with no increment bump `patch` (`prepatch` in
///    pre-release mode).
/// 5. Release types bump the latest version, `major`/`minor`/`patch` being
///    promoted to their `pre*` form in pre-release mode.
/// 6. Anything else that looks like a version is coerced, with a warning.
///
/// `None` means the caller has to ask the operator or give up.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver;

impl VersionResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves the next version for `request`.
    #[must_use]
    pub fn resolve(&self, request: &VersionRequest) -> Option<Resolution> {
        let latest = &request.latest_version;
        let id = request.pre_release_id.as_deref();
        let base = request.pre_release_base.as_deref();

        match &request.increment {
            Some(Increment::NoBump) => Some(Resolution::exact(latest.clone())),
            Some(Increment::Explicit(input)) => match parse_loose(input) {
                Some(version) if version > *latest => Some(Resolution::exact(version)),
                Some(_) => None,
                None => self.coerce(input).map(|version| Resolution {
                    warnings: vec![format!(
                        "coerced invalid version \"{input}\" into \"{version}\""
                    )],
                    version,
                }),
            },
            Some(Increment::Type(release_type)) => {
                let release_type = if request.is_pre_release {
                    release_type.to_pre()
                } else {
                    *release_type
                };
                Some(Resolution::exact(self.increment(latest, release_type, id, base)))
            }
            None if request.is_pre_release && !latest.pre.is_empty() => Some(Resolution::exact(
                self.increment(latest, ReleaseType::PreRelease, id, base),
            )),
            None if request.ci => {
                let release_type = if request.is_pre_release {
                    ReleaseType::PrePatch
                } else {
                    ReleaseType::Patch
                };
                Some(Resolution::exact(self.increment(latest, release_type, id, base)))
            }
            None => None,
        }
    }

    /// Bumps `version` by `release_type`.
    ///
    /// `id` names the pre-release series; `base` (`"0"` or `"1"`) is the
    /// first counter of a new series.
    #[must_use]
    pub fn increment(
        &self,
        version: &Version,
        release_type: ReleaseType,
        id: Option<&str>,
        base: Option<&str>,
    ) -> Version {
        let mut next = version.clone();
        next.build = BuildMetadata::EMPTY;

        match release_type {
            ReleaseType::Major => {
                if next.minor != 0 || next.patch != 0 || next.pre.is_empty() {
                    next.major += 1;
                }
                next.minor = 0;
                next.patch = 0;
                next.pre = Prerelease::EMPTY;
            }
            ReleaseType::Minor => {
                if next.patch != 0 || next.pre.is_empty() {
                    next.minor += 1;
                }
                next.patch = 0;
                next.pre = Prerelease::EMPTY;
            }
            ReleaseType::Patch => {
                if next.pre.is_empty() {
                    next.patch += 1;
                }
                next.pre = Prerelease::EMPTY;
            }
            ReleaseType::PreMajor => {
                next.major += 1;
                next.minor = 0;
                next.patch = 0;
                next.pre = bump_pre(&[], id, base);
            }
            ReleaseType::PreMinor => {
                next.minor += 1;
                next.patch = 0;
                next.pre = bump_pre(&[], id, base);
            }
            ReleaseType::PrePatch => {
                next.patch += 1;
                next.pre = bump_pre(&[], id, base);
            }
            ReleaseType::PreRelease => {
                if next.pre.is_empty() {
                    next.patch += 1;
                }
                let current = identifiers(&next.pre);
                next.pre = bump_pre(&current, id, base);
            }
        }

        next
    }

    /// Extracts `major[.minor[.patch]]` from arbitrary text.
    #[must_use]
    pub fn coerce(&self, input: &str) -> Option<Version> {
        let caps = COERCE_RE.captures(input)?;
        let part = |i: usize| -> Option<u64> {
            caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
        };
        Some(Version::new(part(1)?, part(2)?, part(3)?))
    }
}

/// Parses a version, accepting a leading `v` or `=`.
fn parse_loose(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ident {
    Num(u64),
    Text(String),
}

impl Ident {
    fn render(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

fn identifiers(pre: &Prerelease) -> Vec<Ident> {
    if pre.is_empty() {
        return Vec::new();
    }
    pre.as_str()
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_or_else(|_| Ident::Text(part.to_string()), Ident::Num)
        })
        .collect()
}

/// Advances pre-release identifiers.
///
/// The last numeric identifier is incremented; without one the base is
/// appended. A different `id` starts a new series at `<id>.<base>`.
fn bump_pre(current: &[Ident], id: Option<&str>, base: Option<&str>) -> Prerelease {
    let base = u64::from(base.is_some_and(|b| b.parse::<u64>().is_ok_and(|n| n != 0)));

    let mut next = current.to_vec();
    if next.is_empty() {
        next.push(Ident::Num(base));
    } else if let Some(last) = next.iter_mut().rev().find_map(|ident| match ident {
        Ident::Num(n) => Some(n),
        Ident::Text(_) => None,
    }) {
        *last += 1;
    } else {
        next.push(Ident::Num(base));
    }

    if let Some(id) = id.filter(|id| !id.is_empty()) {
        let fresh = vec![Ident::Text(id.to_string()), Ident::Num(base)];
        let same_series = next.first().is_some_and(|first| first.render() == id);
        if !same_series || !matches!(next.get(1), Some(Ident::Num(_))) {
            next = fresh;
        }
    }

    let joined = next.iter().map(Ident::render).collect::<Vec<_>>().join(".");
    Prerelease::new(&joined).unwrap_or(Prerelease::EMPTY)
}
