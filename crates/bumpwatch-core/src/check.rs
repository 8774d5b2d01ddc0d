//! End-to-end check: validate inputs, reconstruct history, decide.

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::decision::{DecisionError, DecisionInput, decide};
use crate::extract::{CommandRunner, Extraction};
use crate::files::RelevantFiles;
use crate::history::{CommitRange, HistoryError, TrackedFile, reconstruct};
use crate::outcome::CheckOutcome;
use crate::provider::GitProvider;
use crate::version::{IncrementType, Version};

/// Errors from a check run.
#[derive(Error, Debug)]
pub enum CheckError {
    /// An input failed validation before any provider call.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidInput {
        /// Config or flag name.
        field: &'static str,
        /// Received value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// History reconstruction failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The decision engine failed.
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

/// Result alias for check operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Per-invocation values that take precedence over configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckOverrides {
    /// Range base (absent, empty or all-zero means "find the branch point").
    pub base: Option<String>,
    /// Range head (default `HEAD`).
    pub head: Option<String>,
    /// Tracked file.
    pub file: Option<String>,
    /// Extraction method.
    pub extraction: Option<String>,
    /// Latest published version.
    pub registry_version: Option<String>,
    /// Relevant-file patterns; replaces the configured list when non-empty.
    pub relevant_files: Vec<String>,
    /// Increment label.
    pub increment: Option<String>,
}

impl CheckOverrides {
    /// The validated commit range.
    pub fn range(&self) -> CheckResult<CommitRange> {
        let head = self.head.as_deref().unwrap_or("HEAD");
        if head.trim().is_empty() {
            return Err(invalid("head", head, "a head commit is required"));
        }
        Ok(CommitRange::new(self.base.as_deref(), head.trim()))
    }

    /// The validated tracked-file settings.
    pub fn tracked(&self, config: &Config) -> CheckResult<TrackedFile> {
        let method = self.extraction.as_deref().unwrap_or(&config.track.extraction);
        let extraction = Extraction::parse(method).map_err(|e| invalid("extraction", method, e))?;

        let file = self.file.as_deref().unwrap_or(&config.track.file);
        if file.trim().is_empty() {
            return Err(invalid("file", file, "a tracked file path is required"));
        }

        let concurrency = config.track.fetch_concurrency;
        if concurrency < 1 {
            return Err(invalid(
                "fetch_concurrency",
                &concurrency.to_string(),
                "must be at least 1",
            ));
        }

        Ok(TrackedFile {
            path: file.trim().to_string(),
            extraction,
            fetch_concurrency: concurrency,
        })
    }
}

/// A validated check request.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Commit range to examine.
    pub range: CommitRange,
    /// Tracked file and extraction settings.
    pub tracked: TrackedFile,
    /// Latest published version.
    pub registry_version: Version,
    /// Increment for automatic publishes.
    pub increment: IncrementType,
    /// Relevant-file patterns.
    pub relevant: RelevantFiles,
}

fn invalid(field: &'static str, value: &str, reason: impl ToString) -> CheckError {
    CheckError::InvalidInput {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl CheckRequest {
    /// Merge `overrides` over `config` and validate everything.
    pub fn from_config(config: &Config, overrides: &CheckOverrides) -> CheckResult<Self> {
        let registry = overrides
            .registry_version
            .as_deref()
            .or(config.publish.registry_version.as_deref())
            .ok_or_else(|| invalid("registry_version", "", "a registry version is required"))?;
        let registry_version =
            Version::parse(registry.trim()).map_err(|e| invalid("registry_version", registry, e))?;

        let label = overrides
            .increment
            .as_deref()
            .unwrap_or(&config.publish.increment);
        let increment: IncrementType = label.parse().map_err(|e| invalid("increment", label, e))?;
        if increment != IncrementType::PreRelease {
            return Err(invalid(
                "increment",
                label,
                "only pre-release increments can be requested",
            ));
        }

        let patterns: &[String] = if overrides.relevant_files.is_empty() {
            &config.publish.relevant_files
        } else {
            &overrides.relevant_files
        };
        let relevant = RelevantFiles::new(patterns).map_err(|e| {
            let crate::files::FilesError::InvalidPattern { pattern, message } = e;
            invalid("relevant_files", &pattern, message)
        })?;

        Ok(Self {
            range: overrides.range()?,
            tracked: overrides.tracked(config)?,
            registry_version,
            increment,
            relevant,
        })
    }
}

/// Reconstruct history for `request` and decide whether to publish.
#[instrument(skip_all, fields(head = %request.range.head, file = %request.tracked.path))]
pub fn run_check(
    provider: &dyn GitProvider,
    runner: &dyn CommandRunner,
    request: &CheckRequest,
) -> CheckResult<CheckOutcome> {
    debug!(base = ?request.range.base, "starting check");
    let metadata = reconstruct(provider, runner, &request.range, &request.tracked)?;
    info!(
        changed = metadata.changed,
        old = %metadata.old_version,
        new = %metadata.new_version,
        "history reconstructed"
    );

    let decision = decide(&DecisionInput {
        metadata: &metadata,
        registry_version: request.registry_version,
        increment: request.increment,
        relevant: &request.relevant,
    })?;

    Ok(CheckOutcome { metadata, decision })
}
