//! Next-version computation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Version, VersionError, VersionResult};

/// How to compute the next version from the latest published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IncrementType {
    /// `(major+1).0.0`.
    Major,
    /// `major.(minor+1).0`.
    Minor,
    /// `major.minor.(patch+1)`.
    Patch,
    /// Next numeric pre-release (`x.y.(z+1)-0` or `x.y.z-(n+1)`).
    #[default]
    PreRelease,
}

impl IncrementType {
    /// Label used in configuration and outputs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::PreRelease => "pre-release",
        }
    }
}

impl fmt::Display for IncrementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncrementType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "pre-release" => Ok(Self::PreRelease),
            other => Err(VersionError::UnknownIncrement(other.to_string())),
        }
    }
}

/// Apply an increment to `current`.
///
/// A pre-release increment on a release version opens the next patch's
/// pre-release line at `-0`; on a pre-release it bumps the suffix. All other
/// increments drop the suffix.
///
/// # Errors
///
/// Returns [`VersionError::IncrementOverflow`] when the incremented
/// component is already `u64::MAX`.
pub fn increment(current: &Version, kind: IncrementType) -> VersionResult<Version> {
    let bump = |value: u64, component: &'static str| {
        value
            .checked_add(1)
            .ok_or_else(|| VersionError::IncrementOverflow {
                version: *current,
                component,
            })
    };
    let Version {
        major,
        minor,
        patch,
        pre_release,
    } = *current;

    Ok(match kind {
        IncrementType::PreRelease => match pre_release {
            None => Version::with_pre_release(major, minor, bump(patch, "patch")?, 0),
            Some(pre) => Version::with_pre_release(major, minor, patch, bump(pre, "pre-release")?),
        },
        IncrementType::Patch => Version::new(major, minor, bump(patch, "patch")?),
        IncrementType::Minor => Version::new(major, bump(minor, "minor")?, 0),
        IncrementType::Major => Version::new(bump(major, "major")?, 0, 0),
    })
}
