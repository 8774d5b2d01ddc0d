//! Version history reconstruction over a commit range.
//!
//! Given a commit range and a tracked file, this module:
//!
//! 1. asks the provider for the range diff (changed files, commits, base)
//! 2. filters merge commits, keeping those that carry a version forward
//! 3. fetches the tracked file at every kept commit, concurrently
//! 4. extracts a version from each payload with the configured strategy
//! 5. collapses consecutive duplicates and records each transition
//!
//! A commit where the file does not exist yet contributes a `0.0.0`
//! fallback. Fallback payloads are always read as JSON, even when another
//! extraction strategy is configured.

use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::extract::{CommandRunner, ExtractError, Extraction, extract_version, parse_json_version};
use crate::files::CategorizedChangedFiles;
use crate::provider::{Commit, GitProvider, ProviderError};
use crate::version::{DiffType, Version, diff_type};

/// Payload substituted when the tracked file is absent at a commit.
pub const FALLBACK_PAYLOAD: &str = r#"{"version":"0.0.0"}"#;

/// Default number of content fetches in flight at once.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Errors from history reconstruction.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The range diff could not be fetched.
    #[error("failed to compare {base}..{head}: {source}")]
    Compare {
        /// Range base.
        base: String,
        /// Range head.
        head: String,
        /// Provider failure.
        source: ProviderError,
    },

    /// No base was given and the branch point lookup failed.
    #[error("failed to find a base commit for {head}: {source}")]
    Backtrack {
        /// Range head.
        head: String,
        /// Provider failure.
        source: ProviderError,
    },

    /// The range diff carried no file data.
    #[error("comparison of {base}..{head} returned no file data")]
    MissingFiles {
        /// Range base.
        base: String,
        /// Range head.
        head: String,
    },

    /// Content fetches failed for reasons other than a missing file.
    #[error("failed to fetch {path} at {}: {message}", .shas.join(", "))]
    Fetch {
        /// Tracked file.
        path: String,
        /// Every commit whose fetch failed.
        shas: Vec<String>,
        /// First failure message.
        message: String,
    },

    /// Fetched content was not base64-encoded UTF-8.
    #[error("content of {path} at {sha} could not be decoded: {message}")]
    Decode {
        /// Tracked file.
        path: String,
        /// Commit SHA.
        sha: String,
        /// Decoder message.
        message: String,
    },

    /// A fetched payload did not yield a version.
    #[error("failed to read version from {path} at {sha}: {source}")]
    Extract {
        /// Tracked file.
        path: String,
        /// Commit SHA (`<root>` for the synthetic parent).
        sha: String,
        /// Extraction failure.
        source: ExtractError,
    },

    /// Adjacent deduplicated versions compared equal.
    #[error("internal error: consecutive versions {old} and {new} are equal after deduplication")]
    Inconsistent {
        /// Older version.
        old: Version,
        /// Newer version.
        new: Version,
    },
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// The range to examine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    /// Range base. `None` for a new branch or first push.
    pub base: Option<String>,
    /// Range head.
    pub head: String,
}

impl CommitRange {
    /// Build a range. An empty or all-zero base counts as absent.
    pub fn new(base: Option<&str>, head: impl Into<String>) -> Self {
        let base = base
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.chars().all(|c| c == '0'))
            .map(str::to_string);
        Self {
            base,
            head: head.into(),
        }
    }
}

/// What to track and how.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    /// Path of the tracked file, relative to the repository root.
    pub path: String,
    /// Version extraction strategy for real payloads.
    pub extraction: Extraction,
    /// Upper bound on concurrent content fetches (at least 1).
    pub fetch_concurrency: usize,
}

impl TrackedFile {
    /// Track `path` with JSON extraction and default concurrency.
    pub fn json(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extraction: Extraction::Json,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// One transition between two consecutive distinct versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    /// Version before the transition.
    pub old_version: Version,
    /// Version after the transition.
    pub new_version: Version,
    /// Magnitude of the transition.
    #[serde(rename = "type")]
    pub kind: DiffType,
    /// Commit where `new_version` first appears.
    pub commit: String,
}

/// Reconstructed version history for a range.
///
/// `kind` and `commit_responsible` are present exactly when `changed` is
/// true, and `changes` is then non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Whether the version moved across the range.
    pub changed: bool,
    /// Version at the oldest examined commit.
    pub old_version: Version,
    /// Version at the newest examined commit.
    pub new_version: Version,
    /// `diff_type(old_version, new_version)`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DiffType>,
    /// Commit of the last recorded change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_responsible: Option<String>,
    /// Effective range base.
    pub commit_base: String,
    /// Effective range head.
    pub commit_head: String,
    /// Recorded transitions, oldest first.
    pub changes: Vec<VersionChange>,
    /// Files changed across the range.
    pub changed_files: CategorizedChangedFiles,
}

/// An entry of the examined sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExaminedCommit {
    /// Placeholder parent of a root commit, seeded with the fallback version.
    Sentinel,
    /// A real commit.
    Commit(Commit),
}

impl ExaminedCommit {
    /// SHA of a real commit.
    pub fn sha(&self) -> Option<&str> {
        match self {
            Self::Sentinel => None,
            Self::Commit(c) => Some(&c.sha),
        }
    }
}

/// Drop merge commits that do not carry a version forward.
///
/// Single-parent commits are kept. Root commits are kept behind a
/// [`ExaminedCommit::Sentinel`]. A merge is kept when its SHA starts with
/// one of `bases`, or when its first parent is the previously kept commit.
/// `bases` holds the base as supplied and as resolved, since a supplied
/// ref name never prefixes a SHA. `commits` must be in chronological order.
pub fn filter_examined(commits: Vec<Commit>, bases: &[&str]) -> Vec<ExaminedCommit> {
    let mut last_kept: Option<String> = None;
    let mut kept = Vec::with_capacity(commits.len() + 1);

    for commit in commits {
        let keep = match commit.parents.as_slice() {
            [] => {
                kept.push(ExaminedCommit::Sentinel);
                true
            }
            [_] => true,
            [first, ..] => {
                let is_base = bases
                    .iter()
                    .any(|b| !b.is_empty() && commit.sha.starts_with(b));
                let continues = last_kept.as_deref() == Some(first.as_str());
                debug!(sha = %commit.sha, is_base, continues, "merge commit");
                is_base || continues
            }
        };

        if keep {
            last_kept = Some(commit.sha.clone());
            kept.push(ExaminedCommit::Commit(commit));
        }
    }
    kept
}

/// Keep the first item of every run of consecutive items with equal keys.
///
/// `[A, A, B, B, A]` becomes `[A, B, A]`.
pub fn dedup_consecutive_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut out: Vec<T> = Vec::new();
    let mut last: Option<K> = None;
    for item in items {
        let k = key(&item);
        if last.as_ref() != Some(&k) {
            last = Some(k);
            out.push(item);
        }
    }
    out
}

/// A payload ready for version extraction.
#[derive(Debug, Clone)]
struct Payload {
    sha: Option<String>,
    content: String,
    fallback: bool,
}

impl Payload {
    fn fallback(sha: Option<String>) -> Self {
        Self {
            sha,
            content: FALLBACK_PAYLOAD.to_string(),
            fallback: true,
        }
    }

    fn label(&self) -> String {
        self.sha.clone().unwrap_or_else(|| "<root>".to_string())
    }
}

/// Reconstruct the version history of `tracked` across `range`.
#[instrument(skip(provider, runner, tracked), fields(path = %tracked.path))]
pub fn reconstruct(
    provider: &dyn GitProvider,
    runner: &dyn CommandRunner,
    range: &CommitRange,
    tracked: &TrackedFile,
) -> HistoryResult<VersionMetadata> {
    let base = match &range.base {
        Some(base) => base.clone(),
        None => {
            let point = provider
                .backtrack_to_first_branch_ref(&range.head)
                .map_err(|source| HistoryError::Backtrack {
                    head: range.head.clone(),
                    source,
                })?;
            debug!(sha = %point.sha, kind = ?point.kind, "no base given, using branch point");
            point.sha
        }
    };

    let comparison =
        provider
            .compare_commits(&base, &range.head)
            .map_err(|source| HistoryError::Compare {
                base: base.clone(),
                head: range.head.clone(),
                source,
            })?;

    let records = comparison
        .files
        .as_deref()
        .ok_or_else(|| HistoryError::MissingFiles {
            base: base.clone(),
            head: range.head.clone(),
        })?;
    let changed_files = CategorizedChangedFiles::from_records(records);

    let commit_base = comparison.base_commit.sha.clone();
    let commit_head = comparison
        .commits
        .last()
        .map_or_else(|| commit_base.clone(), |c| c.sha.clone());

    let mut all = Vec::with_capacity(comparison.commits.len() + 1);
    all.push(comparison.base_commit);
    all.extend(comparison.commits);
    let examined = filter_examined(all, &[base.as_str(), commit_base.as_str()]);
    debug!(count = examined.len(), "examined commits");

    let payloads = fetch_payloads(provider, &tracked.path, &examined, tracked.fetch_concurrency)?;
    let payloads = dedup_consecutive_by(payloads, |p| p.content.clone());

    let mut versions = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        let parsed = if payload.fallback {
            parse_json_version(&payload.content)
        } else {
            extract_version(&payload.content, &tracked.extraction, runner)
        };
        let version = parsed.map_err(|source| HistoryError::Extract {
            path: tracked.path.clone(),
            sha: payload.label(),
            source,
        })?;
        debug!(sha = %payload.label(), %version, "version at commit");
        versions.push((payload.sha.clone(), version));
    }
    let versions = dedup_consecutive_by(versions, |(_, v)| *v);

    let mut changes = Vec::with_capacity(versions.len().saturating_sub(1));
    for pair in versions.windows(2) {
        let (_, old) = &pair[0];
        let (sha, new) = &pair[1];
        let kind = diff_type(old, new);
        if kind == DiffType::Equal {
            return Err(HistoryError::Inconsistent { old: *old, new: *new });
        }
        changes.push(VersionChange {
            old_version: *old,
            new_version: *new,
            kind,
            commit: sha.clone().unwrap_or_default(),
        });
    }

    let old_version = versions.first().map_or(Version::ZERO, |(_, v)| *v);
    let new_version = versions.last().map_or(old_version, |(_, v)| *v);

    if changes.is_empty() || new_version == old_version {
        if !changes.is_empty() {
            debug!(
                discarded = changes.len(),
                "version returned to its starting value"
            );
        }
        return Ok(VersionMetadata {
            changed: false,
            old_version,
            new_version: old_version,
            kind: None,
            commit_responsible: None,
            commit_base,
            commit_head,
            changes: Vec::new(),
            changed_files,
        });
    }

    let commit_responsible = changes.last().map(|c| c.commit.clone());
    Ok(VersionMetadata {
        changed: true,
        old_version,
        new_version,
        kind: Some(diff_type(&old_version, &new_version)),
        commit_responsible,
        commit_base,
        commit_head,
        changes,
        changed_files,
    })
}

/// Fetch the tracked file at every examined commit, in bounded batches.
fn fetch_payloads(
    provider: &dyn GitProvider,
    path: &str,
    examined: &[ExaminedCommit],
    concurrency: usize,
) -> HistoryResult<Vec<Payload>> {
    let shas: Vec<&str> = examined.iter().filter_map(ExaminedCommit::sha).collect();
    let mut fetched = Vec::with_capacity(shas.len());

    for batch in shas.chunks(concurrency.max(1)) {
        debug!(size = batch.len(), "fetching batch");
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|sha| scope.spawn(move || provider.get_content(path, sha)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ProviderError::Unavailable {
                            operation: "get content".into(),
                            message: "fetch thread panicked".into(),
                        })
                    })
                })
                .collect()
        });
        fetched.extend(results);
    }

    let mut fetched = fetched.into_iter();
    let mut payloads = Vec::with_capacity(examined.len());
    let mut failed: Vec<String> = Vec::new();
    let mut first_message = None;

    for entry in examined {
        let Some(sha) = entry.sha() else {
            payloads.push(Payload::fallback(None));
            continue;
        };
        let sha = sha.to_string();
        match fetched.next() {
            Some(Ok(file)) => {
                let content = decode_content(&file.content).map_err(|message| {
                    HistoryError::Decode {
                        path: path.to_string(),
                        sha: sha.clone(),
                        message,
                    }
                })?;
                payloads.push(Payload {
                    sha: Some(sha),
                    content,
                    fallback: false,
                });
            }
            Some(Err(e)) if e.is_not_found() => {
                warn!(%sha, %path, "file not found at commit, falling back to 0.0.0");
                payloads.push(Payload::fallback(Some(sha)));
            }
            Some(Err(e)) => {
                first_message.get_or_insert_with(|| e.to_string());
                failed.push(sha);
            }
            None => {
                first_message.get_or_insert_with(|| "no fetch result".to_string());
                failed.push(sha);
            }
        }
    }

    if !failed.is_empty() {
        return Err(HistoryError::Fetch {
            path: path.to_string(),
            shas: failed,
            message: first_message.unwrap_or_default(),
        });
    }
    Ok(payloads)
}

/// Decode a base64 payload, ignoring embedded whitespace.
fn decode_content(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
