//! Restricted version grammar, diff classification and increments.
//!
//! Versions tracked by bumpwatch follow `major.minor.patch[-N]`, where the
//! optional pre-release suffix is a single non-negative integer. This is a
//! subset of semver: no alphanumeric identifiers, no build
//! metadata.

pub mod diff;
pub mod increment;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use diff::{DiffType, diff_type};
pub use increment::{IncrementType, increment};

static VERSION_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-(\d+))?$").expect("version grammar is a valid regex")
});

/// Errors from version parsing and arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The string does not match `major.minor.patch[-N]`.
    #[error("invalid version {0:?}: expected major.minor.patch[-N]")]
    Malformed(String),

    /// A component does not fit in 64 bits.
    #[error("invalid version {input:?}: {component} component is out of range")]
    OutOfRange {
        /// The rejected input.
        input: String,
        /// Which component overflowed.
        component: &'static str,
    },

    /// Incrementing would overflow a component.
    #[error("cannot increment {component} of {version}: component is already at its maximum")]
    IncrementOverflow {
        /// The version being incremented.
        version: Version,
        /// Which component overflowed.
        component: &'static str,
    },

    /// An increment label outside major/minor/patch/pre-release.
    #[error("unknown increment type {0:?}: expected major, minor, patch or pre-release")]
    UnknownIncrement(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// A parsed `major.minor.patch[-N]` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Numeric pre-release suffix, if present.
    pub pre_release: Option<u64>,
}

impl Version {
    /// The fallback version used when no history exists.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a release version without a pre-release suffix.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    /// Create a version with a numeric pre-release suffix.
    pub const fn with_pre_release(major: u64, minor: u64, patch: u64, pre: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: Some(pre),
        }
    }

    /// Parse a string against the restricted grammar.
    ///
    /// Surrounding whitespace is not stripped; callers that read versions
    /// from command output or regex captures trim first.
    pub fn parse(input: &str) -> VersionResult<Self> {
        let caps = VERSION_GRAMMAR
            .captures(input)
            .ok_or_else(|| VersionError::Malformed(input.to_string()))?;

        let component = |idx: usize, name: &'static str| -> VersionResult<u64> {
            caps[idx].parse().map_err(|_| VersionError::OutOfRange {
                input: input.to_string(),
                component: name,
            })
        };

        Ok(Self {
            major: component(1, "major")?,
            minor: component(2, "minor")?,
            patch: component(3, "patch")?,
            pre_release: match caps.get(4) {
                Some(_) => Some(component(4, "pre-release")?),
                None => None,
            },
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre_release {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_release() {
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_pre_release() {
        assert_eq!(
            Version::parse("1.2.3-4").unwrap(),
            Version::with_pre_release(1, 2, 3, 4)
        );
    }

    #[test]
    fn parse_rejects_outside_grammar() {
        for input in [
            "",
            "1.2",
            "1.2.3.4",
            "v1.2.3",
            "1.2.3-beta",
            "1.2.3-1.2",
            "1.2.3+build",
            " 1.2.3",
            "1.2.3-",
        ] {
            assert!(
                matches!(Version::parse(input), Err(VersionError::Malformed(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        let err = Version::parse("99999999999999999999.0.0").unwrap_err();
        assert!(matches!(
            err,
            VersionError::OutOfRange {
                component: "major",
                ..
            }
        ));
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Version::with_pre_release(0, 0, 41, 0).to_string(), "0.0.41-0");
        assert_eq!(Version::new(10, 0, 1).to_string(), "10.0.1");
    }

    #[test]
    fn serde_uses_string_form() {
        let v = Version::with_pre_release(1, 0, 0, 2);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.0.0-2\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<Version>("\"1.0\"").is_err());
    }

    #[test]
    fn error_names_the_input() {
        let err = Version::parse("banana").unwrap_err();
        assert!(err.to_string().contains("\"banana\""));
    }
}
