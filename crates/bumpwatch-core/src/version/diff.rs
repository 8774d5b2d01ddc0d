//! Magnitude classification between two versions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Version;

/// The magnitude of a version transition.
///
/// `Equal` is an internal sentinel: it is returned when all components match
/// and never appears on a recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffType {
    /// Major component differs.
    Major,
    /// Minor component differs (major equal).
    Minor,
    /// Patch component differs (major and minor equal).
    Patch,
    /// Only the pre-release suffix differs, including its presence.
    PreRelease,
    /// All components are identical.
    Equal,
}

impl DiffType {
    /// Label used in outputs and rationale text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::PreRelease => "pre-release",
            Self::Equal => "equal",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the transition from `old` to `new`.
///
/// Components are compared in priority order major, minor, patch,
/// pre-release; the first one that differs decides. Dropping or adding a
/// pre-release suffix with the numeric triple unchanged is `PreRelease`.
pub fn diff_type(old: &Version, new: &Version) -> DiffType {
    if old.major != new.major {
        DiffType::Major
    } else if old.minor != new.minor {
        DiffType::Minor
    } else if old.patch != new.patch {
        DiffType::Patch
    } else if old.pre_release != new.pre_release {
        DiffType::PreRelease
    } else {
        DiffType::Equal
    }
}
