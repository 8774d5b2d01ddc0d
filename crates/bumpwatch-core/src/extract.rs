//! Version extraction strategies.
//!
//! A tracked file's content is turned into a [`Version`] by exactly one
//! strategy per run:
//!
//! - `json` - parse as JSON and read the top-level `version` field
//! - `regex:<pattern>` - take capture group 1 of the first match
//! - `command:<shell command>` - pipe the content to a shell command and read
//!   its stdout
//!
//! The process boundary sits behind [`CommandRunner`] so tests can stub it.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::version::{Version, VersionError};

/// Errors from extracting a version out of file content.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The extraction method string was not recognised.
    #[error("invalid extraction method {0:?}: expected json, regex:<pattern> or command:<command>")]
    InvalidMethod(String),

    /// The regex pattern did not compile or lacks a capture group.
    #[error("invalid extraction regex {pattern:?}: {message}")]
    InvalidPattern {
        /// The supplied pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// Content was not valid JSON.
    #[error("content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON content had no usable `version` field.
    #[error("JSON content has no non-empty string \"version\" field")]
    MissingVersionField,

    /// The regex did not match the content.
    #[error("pattern {pattern:?} did not match the file content")]
    NoMatch {
        /// The pattern that failed to match.
        pattern: String,
    },

    /// The extracted text is not a valid version.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The extraction command exited unsuccessfully.
    #[error("extraction command {command:?} failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// The extraction command could not be spawned.
    #[error("failed to run extraction command: {0}")]
    Exec(#[from] std::io::Error),
}

/// Result alias for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// The configured extraction strategy.
#[derive(Debug, Clone, Default)]
pub enum Extraction {
    /// Read the `version` field of a JSON document.
    #[default]
    Json,
    /// Apply a regex and validate capture group 1.
    Regex(Regex),
    /// Pipe content to a shell command and validate its stdout.
    Command(String),
}

impl Extraction {
    /// Parse `json`, `regex:<pattern>` or `command:<command>`.
    pub fn parse(method: &str) -> ExtractResult<Self> {
        if method == "json" {
            return Ok(Self::Json);
        }
        if let Some(pattern) = method.strip_prefix("regex:") {
            let regex = Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            if regex.captures_len() < 2 {
                return Err(ExtractError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: "pattern needs at least one capture group".into(),
                });
            }
            return Ok(Self::Regex(regex));
        }
        if let Some(command) = method.strip_prefix("command:") {
            let command = command.trim();
            if command.is_empty() {
                return Err(ExtractError::InvalidMethod(method.to_string()));
            }
            return Ok(Self::Command(command.to_string()));
        }
        Err(ExtractError::InvalidMethod(method.to_string()))
    }
}

impl FromStr for Extraction {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Regex(re) => write!(f, "regex:{}", re.as_str()),
            Self::Command(cmd) => write!(f, "command:{cmd}"),
        }
    }
}

/// Runs an extraction command with the file content on stdin.
pub trait CommandRunner: Send + Sync {
    /// Run `command`, feed `input` on stdin, and return its raw stdout.
    fn run(&self, command: &str, input: &str) -> ExtractResult<String>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    #[instrument(skip(self, input), fields(input_len = input.len()))]
    fn run(&self, command: &str, input: &str) -> ExtractResult<String> {
        let mut child = Command::new("sh")
            .args(["-c", command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // Commands that ignore stdin may exit before we finish writing.
            match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ExtractError::CommandFailed {
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Extract a validated version from `content` using `method`.
pub fn extract_version(
    content: &str,
    method: &Extraction,
    runner: &dyn CommandRunner,
) -> ExtractResult<Version> {
    match method {
        Extraction::Json => parse_json_version(content),
        Extraction::Regex(re) => {
            let raw = re
                .captures(content)
                .and_then(|caps| caps.get(1))
                .ok_or_else(|| ExtractError::NoMatch {
                    pattern: re.as_str().to_string(),
                })?;
            let version = Version::parse(raw.as_str().trim())?;
            debug!(%version, "regex extracted version");
            Ok(version)
        }
        Extraction::Command(command) => {
            let stdout = runner.run(command, content)?;
            let version = Version::parse(stdout.trim())?;
            debug!(%version, %command, "command extracted version");
            Ok(version)
        }
    }
}

/// Read the top-level `version` field of a JSON document.
///
/// This path is used directly for synthetic fallback payloads, whatever
/// strategy is configured.
pub fn parse_json_version(content: &str) -> ExtractResult<Version> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    let raw = doc
        .get("version")
        .and_then(serde_json::Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(ExtractError::MissingVersionField)?;
    Ok(Version::parse(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runner that returns a canned answer and never spawns anything.
    struct CannedRunner(Result<&'static str, i32>);

    impl CommandRunner for CannedRunner {
        fn run(&self, command: &str, _input: &str) -> ExtractResult<String> {
            match self.0 {
                Ok(out) => Ok(out.to_string()),
                Err(code) => Err(ExtractError::CommandFailed {
                    command: command.to_string(),
                    exit_code: Some(code),
                    stderr: "boom".into(),
                }),
            }
        }
    }

    #[test]
    fn parse_methods() {
        assert!(matches!(Extraction::parse("json").unwrap(), Extraction::Json));
        assert!(matches!(
            Extraction::parse(r"regex:version = (\S+)").unwrap(),
            Extraction::Regex(_)
        ));
        match Extraction::parse("command: jq -r .version").unwrap() {
            Extraction::Command(cmd) => assert_eq!(cmd, "jq -r .version"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_and_empty() {
        assert!(matches!(
            Extraction::parse("toml"),
            Err(ExtractError::InvalidMethod(_))
        ));
        assert!(matches!(
            Extraction::parse("command:   "),
            Err(ExtractError::InvalidMethod(_))
        ));
    }

    #[test]
    fn parse_rejects_regex_without_group() {
        assert!(matches!(
            Extraction::parse(r"regex:\d+\.\d+\.\d+"),
            Err(ExtractError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Extraction::parse("regex:(unclosed"),
            Err(ExtractError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn display_round_trips_method() {
        for method in ["json", r"regex:v=(\d+\.\d+\.\d+)", "command:cat"] {
            assert_eq!(Extraction::parse(method).unwrap().to_string(), method);
        }
    }

    #[test]
    fn json_reads_version_field() {
        let v = parse_json_version(r#"{"name":"pkg","version":"1.0.4"}"#).unwrap();
        assert_eq!(v, Version::new(1, 0, 4));
    }

    #[test]
    fn json_requires_non_empty_version() {
        assert!(matches!(
            parse_json_version(r#"{"name":"pkg"}"#),
            Err(ExtractError::MissingVersionField)
        ));
        assert!(matches!(
            parse_json_version(r#"{"version":""}"#),
            Err(ExtractError::MissingVersionField)
        ));
        assert!(matches!(
            parse_json_version(r#"{"version":3}"#),
            Err(ExtractError::MissingVersionField)
        ));
    }

    #[test]
    fn json_rejects_garbage_and_bad_versions() {
        assert!(matches!(parse_json_version("not json"), Err(ExtractError::Json(_))));
        assert!(matches!(
            parse_json_version(r#"{"version":"1.0.0-beta.1"}"#),
            Err(ExtractError::Version(_))
        ));
    }

    #[test]
    fn regex_trims_capture() {
        let method = Extraction::parse(r#"regex:version\s*=\s*"([^"]+)""#).unwrap();
        let content = "[package]\nversion = \" 2.1.0 \"\n";
        let v = extract_version(content, &method, &ShellRunner).unwrap();
        assert_eq!(v, Version::new(2, 1, 0));
    }

    #[test]
    fn regex_without_match_fails() {
        let method = Extraction::parse(r"regex:version=(\S+)").unwrap();
        assert!(matches!(
            extract_version("nothing here", &method, &ShellRunner),
            Err(ExtractError::NoMatch { .. })
        ));
    }

    #[test]
    fn command_output_is_trimmed_and_validated() {
        let method = Extraction::Command("anything".into());
        let v = extract_version("ignored", &method, &CannedRunner(Ok("3.0.0-2\n"))).unwrap();
        assert_eq!(v, Version::with_pre_release(3, 0, 0, 2));

        assert!(matches!(
            extract_version("ignored", &method, &CannedRunner(Ok("three"))),
            Err(ExtractError::Version(_))
        ));
    }

    #[test]
    fn command_failure_is_an_error() {
        let method = Extraction::Command("anything".into());
        let err = extract_version("ignored", &method, &CannedRunner(Err(2))).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::CommandFailed {
                exit_code: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn shell_runner_pipes_stdin() {
        let out = ShellRunner.run("cat", "1.4.2\n").unwrap();
        assert_eq!(out.trim(), "1.4.2");
    }

    #[test]
    fn shell_runner_reports_exit_code() {
        let err = ShellRunner.run("echo nope >&2; exit 3", "").unwrap_err();
        match err {
            ExtractError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
