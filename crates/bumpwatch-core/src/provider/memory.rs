//! In-memory commit graph.
//!
//! Serves the same queries as a hosted provider from data held in memory.
//! Built programmatically in tests, or loaded from a JSON snapshot for
//! offline runs:
//!
//! ```json
//! {
//!   "commits": [
//!     { "sha": "a1", "parents": [], "message": "init" },
//!     { "sha": "b2", "parents": ["a1"], "message": "bump" }
//!   ],
//!   "contents": { "a1": { "package.json": "{\"version\":\"1.0.4\"}" } },
//!   "refs": { "refs/heads/main": "a1" },
//!   "changed_files": [{ "filename": "package.json", "status": "modified" }]
//! }
//! ```
//!
//! `commits` must be listed oldest first. `contents` holds raw text; it is
//! base64-encoded on the way out to match the provider contract.

use std::collections::{BTreeMap, HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    BranchPoint, BranchPointKind, ChangedFile, Commit, Comparison, FileContent, GitProvider,
    ProviderError, ProviderResult,
};

#[allow(clippy::unnecessary_wraps)]
const fn some_empty() -> Option<Vec<ChangedFile>> {
    Some(Vec::new())
}

/// A commit graph held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProvider {
    /// Commits, oldest first.
    #[serde(default)]
    commits: Vec<Commit>,
    /// File contents keyed by commit SHA, then path.
    #[serde(default)]
    contents: HashMap<String, HashMap<String, String>>,
    /// Named refs (branches, tags) pointing at SHAs.
    #[serde(default)]
    refs: BTreeMap<String, String>,
    /// Diff reported for any compared range. `null` simulates a provider
    /// response without file data.
    #[serde(default = "some_empty")]
    changed_files: Option<Vec<ChangedFile>>,
    /// SHAs whose content fetches fail with a transport error.
    #[serde(default)]
    unavailable: Vec<String>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            commits: Vec::new(),
            contents: HashMap::new(),
            refs: BTreeMap::new(),
            changed_files: some_empty(),
            unavailable: Vec::new(),
        }
    }

    /// Load a JSON snapshot.
    #[instrument]
    pub fn from_json_file(path: &Utf8Path) -> ProviderResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Snapshot(format!("{path}: {e}")))?;
        let provider = Self::from_json(&raw)
            .map_err(|e| ProviderError::Snapshot(format!("{path}: {e}")))?;
        debug!(commits = provider.commits.len(), "snapshot loaded");
        Ok(provider)
    }

    /// Parse a JSON snapshot from a string.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Append a commit (callers add commits oldest first).
    #[must_use]
    pub fn with_commit(mut self, commit: Commit) -> Self {
        self.commits.push(commit);
        self
    }

    /// Record `content` for `path` at `sha`.
    #[must_use]
    pub fn with_content(mut self, sha: &str, path: &str, content: &str) -> Self {
        self.contents
            .entry(sha.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Point a named ref at `sha`.
    #[must_use]
    pub fn with_ref(mut self, name: &str, sha: &str) -> Self {
        self.refs.insert(name.to_string(), sha.to_string());
        self
    }

    /// Set the diff reported by [`GitProvider::compare_commits`].
    #[must_use]
    pub fn with_changed_files(mut self, files: Vec<ChangedFile>) -> Self {
        self.changed_files = Some(files);
        self
    }

    /// Report comparisons without any file data.
    #[must_use]
    pub fn without_file_data(mut self) -> Self {
        self.changed_files = None;
        self
    }

    /// Make content fetches at `sha` fail with a transport error.
    #[must_use]
    pub fn with_unavailable(mut self, sha: &str) -> Self {
        self.unavailable.push(sha.to_string());
        self
    }

    /// Resolve a SHA, SHA prefix or ref name to a commit.
    fn resolve(&self, reference: &str) -> ProviderResult<&Commit> {
        let target = self.refs.get(reference).map_or(reference, String::as_str);

        if let Some(exact) = self.commits.iter().find(|c| c.sha == target) {
            return Ok(exact);
        }

        let mut prefixed = self.commits.iter().filter(|c| c.sha.starts_with(target));
        match (prefixed.next(), prefixed.next()) {
            (Some(only), None) if !target.is_empty() => Ok(only),
            _ => Err(ProviderError::UnknownCommit(reference.to_string())),
        }
    }

    fn by_sha(&self) -> HashMap<&str, &Commit> {
        self.commits.iter().map(|c| (c.sha.as_str(), c)).collect()
    }

    /// All SHAs reachable from `start` (inclusive) over parent links.
    fn reachable<'a>(index: &HashMap<&'a str, &'a Commit>, start: &'a str) -> HashSet<&'a str> {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(sha) = stack.pop() {
            if !seen.insert(sha) {
                continue;
            }
            if let Some(commit) = index.get(sha) {
                stack.extend(commit.parents.iter().map(String::as_str));
            }
        }
        seen
    }
}

impl GitProvider for MemoryProvider {
    #[instrument(skip(self))]
    fn compare_commits(&self, base: &str, head: &str) -> ProviderResult<Comparison> {
        let base_commit = self.resolve(base)?;
        let head_commit = self.resolve(head)?;
        let index = self.by_sha();

        let excluded = Self::reachable(&index, &base_commit.sha);
        let included = Self::reachable(&index, &head_commit.sha);

        let commits: Vec<Commit> = self
            .commits
            .iter()
            .filter(|c| included.contains(c.sha.as_str()) && !excluded.contains(c.sha.as_str()))
            .cloned()
            .collect();

        debug!(count = commits.len(), "compared range");
        Ok(Comparison {
            files: self.changed_files.clone(),
            commits,
            base_commit: base_commit.clone(),
        })
    }

    #[instrument(skip(self))]
    fn get_content(&self, path: &str, reference: &str) -> ProviderResult<FileContent> {
        let commit = self.resolve(reference)?;
        if self.unavailable.iter().any(|sha| commit.sha.starts_with(sha.as_str())) {
            return Err(ProviderError::Unavailable {
                operation: "get content".into(),
                message: format!("content at {} is unavailable", commit.sha),
            });
        }

        self.contents
            .get(&commit.sha)
            .and_then(|files| files.get(path))
            .map(|raw| FileContent {
                content: STANDARD.encode(raw),
            })
            .ok_or_else(|| ProviderError::NotFound {
                path: path.to_string(),
                reference: reference.to_string(),
            })
    }

    #[instrument(skip(self))]
    fn backtrack_to_first_branch_ref(&self, head: &str) -> ProviderResult<BranchPoint> {
        let head_commit = self.resolve(head)?;
        let index = self.by_sha();

        // Refs that already contain head belong to this branch's own line.
        let mut shared: HashSet<&str> = HashSet::new();
        for target in self.refs.values() {
            let Ok(tip) = self.resolve(target) else {
                continue;
            };
            let reach = Self::reachable(&index, &tip.sha);
            if !reach.contains(head_commit.sha.as_str()) {
                shared.extend(reach);
            }
        }

        let mut current = head_commit;
        loop {
            if shared.contains(current.sha.as_str()) {
                debug!(sha = %current.sha, "found branch point");
                return Ok(BranchPoint {
                    sha: current.sha.clone(),
                    kind: BranchPointKind::BranchPoint,
                });
            }
            match current.parents.first().and_then(|p| index.get(p.as_str())) {
                Some(parent) => current = parent,
                None => {
                    debug!(sha = %current.sha, "reached root commit");
                    return Ok(BranchPoint {
                        sha: current.sha.clone(),
                        kind: BranchPointKind::Initial,
                    });
                }
            }
        }
    }
}
