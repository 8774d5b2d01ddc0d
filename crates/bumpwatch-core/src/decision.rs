//! Publish decision.
//!
//! Reconciles reconstructed history with the latest published version:
//!
//! | history                        | relevant files | result                          |
//! |--------------------------------|----------------|---------------------------------|
//! | changed, not already published | any            | publish the new version         |
//! | unchanged or already published | some           | publish `increment(registry)`   |
//! | unchanged or already published | none           | do not publish                  |

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::files::RelevantFiles;
use crate::history::VersionMetadata;
use crate::version::{IncrementType, Version, VersionError, increment};

/// Errors from the decision engine.
#[derive(Error, Debug)]
pub enum DecisionError {
    /// The metadata dump for the reason text could not be produced.
    #[error("failed to serialize version metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The registry version cannot be incremented.
    #[error(transparent)]
    Increment(#[from] VersionError),
}

/// Result alias for decision operations.
pub type DecisionResult<T> = Result<T, DecisionError>;

/// Which narrative produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rationale {
    /// Nothing relevant changed.
    Unchanged,
    /// A version bump was found in history.
    DetectedBump,
    /// No usable bump, but relevant files changed.
    RelevantFilesIncrement,
}

/// Everything the engine looks at.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    /// Reconstructed history.
    pub metadata: &'a VersionMetadata,
    /// Latest version known to the registry.
    pub registry_version: Version,
    /// Increment applied when publishing without a detected bump.
    pub increment: IncrementType,
    /// Patterns that make a changed file relevant.
    pub relevant: &'a RelevantFiles,
}

/// The engine's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDecision {
    /// Whether to publish.
    pub publish: bool,
    /// Version to publish; present exactly when `publish` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Human-readable explanation.
    pub reason: String,
    /// Which branch of the decision table fired.
    pub rationale: Rationale,
    /// Changed files that matched a relevant pattern.
    pub relevant_files: Vec<String>,
    /// Whether the detected new version is already the registry version.
    pub non_linear_history: bool,
}

/// Decide whether and what to publish.
#[instrument(skip_all, fields(registry = %input.registry_version, increment = %input.increment))]
pub fn decide(input: &DecisionInput<'_>) -> DecisionResult<PublishDecision> {
    let meta = input.metadata;
    let relevant_files = input.relevant.select(&meta.changed_files);
    let non_linear = meta.new_version == input.registry_version;
    debug!(
        changed = meta.changed,
        non_linear,
        relevant = relevant_files.len(),
        "deciding"
    );

    let (rationale, version) = if meta.changed && !non_linear {
        (Rationale::DetectedBump, Some(meta.new_version))
    } else if !relevant_files.is_empty() {
        (
            Rationale::RelevantFilesIncrement,
            Some(increment(&input.registry_version, input.increment)?),
        )
    } else {
        (Rationale::Unchanged, None)
    };

    let reason = reason_text(input, rationale, version, &relevant_files, non_linear)?;

    match version {
        Some(v) => info!(version = %v, ?rationale, "publish"),
        None => info!(?rationale, "nothing to publish"),
    }

    Ok(PublishDecision {
        publish: version.is_some(),
        version,
        reason,
        rationale,
        relevant_files,
        non_linear_history: non_linear,
    })
}

fn reason_text(
    input: &DecisionInput<'_>,
    rationale: Rationale,
    version: Option<Version>,
    relevant_files: &[String],
    non_linear: bool,
) -> DecisionResult<String> {
    let meta = input.metadata;
    let patterns = input.relevant.patterns();
    let patterns = if patterns.is_empty() {
        "none configured".to_string()
    } else {
        patterns.join(", ")
    };

    let mut text = String::new();
    match (rationale, version) {
        (Rationale::DetectedBump, Some(v)) => {
            let kind = meta.kind.map_or("unknown", |k| k.as_str());
            let commit = meta.commit_responsible.as_deref().unwrap_or("unknown");
            let _ = writeln!(
                text,
                "Detected a {kind} version change from {} to {} in commit {commit}.",
                meta.old_version, meta.new_version
            );
            let _ = writeln!(text, "Publishing {v}.");
        }
        (Rationale::RelevantFilesIncrement, Some(v)) => {
            if non_linear && meta.changed {
                let _ = writeln!(
                    text,
                    "Version {} is already the latest published version (non-linear history).",
                    meta.new_version
                );
            } else {
                let _ = writeln!(
                    text,
                    "No version change was detected ({} to {}).",
                    meta.old_version, meta.new_version
                );
            }
            let _ = writeln!(text, "Files matching the relevant patterns ({patterns}) changed:");
            for file in relevant_files {
                let _ = writeln!(text, "- {file}");
            }
            let _ = writeln!(
                text,
                "Publishing {v}, a {} increment of registry version {}.",
                input.increment, input.registry_version
            );
        }
        _ if non_linear && meta.changed => {
            let _ = writeln!(
                text,
                "Version {} is already the latest published version (non-linear history) and no changed files match the relevant patterns ({patterns}).",
                meta.new_version
            );
            let _ = writeln!(text, "Nothing to publish.");
        }
        _ => {
            let _ = writeln!(
                text,
                "No version change was detected ({} to {}) and no changed files match the relevant patterns ({patterns}).",
                meta.old_version, meta.new_version
            );
            let _ = writeln!(text, "Nothing to publish.");
        }
    }

    let _ = write!(text, "\nMetadata: {}", serde_json::to_string(meta)?);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::CategorizedChangedFiles;
    use crate::version::DiffType;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn unchanged(version: &str, files: &[&str]) -> VersionMetadata {
        VersionMetadata {
            changed: false,
            old_version: v(version),
            new_version: v(version),
            kind: None,
            commit_responsible: None,
            commit_base: "base".into(),
            commit_head: "head".into(),
            changes: Vec::new(),
            changed_files: CategorizedChangedFiles {
                all: files.iter().map(|f| (*f).to_string()).collect(),
                ..CategorizedChangedFiles::default()
            },
        }
    }

    fn bumped(old: &str, new: &str) -> VersionMetadata {
        let mut meta = unchanged(old, &["package.json"]);
        meta.changed = true;
        meta.new_version = v(new);
        meta.kind = Some(crate::version::diff_type(&v(old), &v(new)));
        meta.commit_responsible = Some("head".into());
        meta.changes = vec![crate::history::VersionChange {
            old_version: v(old),
            new_version: v(new),
            kind: meta.kind.unwrap_or(DiffType::Patch),
            commit: "head".into(),
        }];
        meta
    }

    fn run(meta: &VersionMetadata, registry: &str, patterns: &[&str]) -> PublishDecision {
        let relevant = RelevantFiles::new(patterns).unwrap();
        decide(&DecisionInput {
            metadata: meta,
            registry_version: v(registry),
            increment: IncrementType::PreRelease,
            relevant: &relevant,
        })
        .unwrap()
    }

    #[test]
    fn detected_bump_publishes_new_version() {
        let d = run(&bumped("1.0.4", "1.0.5"), "1.0.4", &[]);
        assert!(d.publish);
        assert_eq!(d.version, Some(v("1.0.5")));
        assert_eq!(d.rationale, Rationale::DetectedBump);
        assert!(d.reason.contains("patch version change from 1.0.4 to 1.0.5"));
    }

    #[test]
    fn already_published_bump_is_incremented_instead() {
        let d = run(&bumped("1.0.0", "1.0.1"), "1.0.1", &["package.json"]);
        assert!(d.publish);
        assert!(d.non_linear_history);
        assert_eq!(d.version, Some(v("1.0.2-0")));
        assert_ne!(d.version, Some(v("1.0.1")));
        assert_eq!(d.rationale, Rationale::RelevantFilesIncrement);
        assert!(d.reason.contains("non-linear history"));
    }

    #[test]
    fn already_published_without_relevant_files_is_skipped() {
        let d = run(&bumped("1.0.0", "1.0.1"), "1.0.1", &["lib/**"]);
        assert!(!d.publish);
        assert_eq!(d.version, None);
        assert!(d.reason.contains("1.0.1 is already the latest published version"));
        assert!(!d.reason.contains("No version change was detected"));
    }

    #[test]
    fn registry_version_at_maximum_is_an_error() {
        let meta = unchanged("1.0.0", &["lib/a.ts"]);
        let relevant = RelevantFiles::new(&["lib/**"]).unwrap();
        let err = decide(&DecisionInput {
            metadata: &meta,
            registry_version: Version::new(0, 0, u64::MAX),
            increment: IncrementType::PreRelease,
            relevant: &relevant,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Increment(VersionError::IncrementOverflow { component: "patch", .. })
        ));
    }

    #[test]
    fn no_relevant_change_does_not_publish() {
        let d = run(&unchanged("1.0.0", &["README.md"]), "1.0.0", &["lib/**/*.ts"]);
        assert!(!d.publish);
        assert!(d.version.is_none());
        assert!(d.relevant_files.is_empty());
        assert_eq!(d.rationale, Rationale::Unchanged);
        assert!(d.reason.contains("Nothing to publish"));
    }

    #[test]
    fn relevant_change_gets_pre_release() {
        let d = run(&unchanged("0.0.40", &["lib/a.ts"]), "0.0.40", &["lib/*.ts"]);
        assert!(d.publish);
        assert_eq!(d.version, Some(v("0.0.41-0")));
        assert_eq!(d.relevant_files, ["lib/a.ts"]);
        assert!(d.reason.contains("- lib/a.ts"));
        assert!(d.reason.contains("lib/*.ts"));
    }

    #[test]
    fn pre_release_registry_bumps_suffix() {
        let d = run(&unchanged("0.0.40", &["lib/a.ts"]), "0.0.41-3", &["lib/*.ts"]);
        assert_eq!(d.version, Some(v("0.0.41-4")));
    }

    #[test]
    fn reason_ends_with_metadata_dump() {
        let d = run(&unchanged("1.0.0", &[]), "1.0.0", &[]);
        let (_, dump) = d.reason.rsplit_once("Metadata: ").unwrap();
        let parsed: VersionMetadata = serde_json::from_str(dump).unwrap();
        assert_eq!(parsed.old_version, v("1.0.0"));
    }

    #[test]
    fn decision_omits_version_when_not_publishing() {
        let d = run(&unchanged("1.0.0", &[]), "1.0.0", &[]);
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["rationale"], "unchanged");
    }
}
