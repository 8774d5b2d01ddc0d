//! Changed-file categorization and relevant-file matching.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::provider::{ChangedFile, FileStatus};

/// Errors from compiling relevant-file patterns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilesError {
    /// A glob pattern could not be compiled.
    #[error("invalid glob pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Result alias for file matching operations.
pub type FilesResult<T> = Result<T, FilesError>;

/// Changed paths grouped by status.
///
/// `all` keeps provider order; every other list is an order-preserving
/// subset of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedChangedFiles {
    /// Every changed path.
    pub all: Vec<String>,
    /// Added paths.
    pub added: Vec<String>,
    /// Modified paths.
    pub modified: Vec<String>,
    /// Removed paths.
    pub removed: Vec<String>,
    /// Renamed paths (destination).
    pub renamed: Vec<String>,
}

impl CategorizedChangedFiles {
    /// Group diff records by status.
    pub fn from_records(records: &[ChangedFile]) -> Self {
        let mut files = Self::default();
        for record in records {
            let name = record.filename.clone();
            match record.status {
                FileStatus::Added => files.added.push(name.clone()),
                FileStatus::Modified => files.modified.push(name.clone()),
                FileStatus::Removed => files.removed.push(name.clone()),
                FileStatus::Renamed => files.renamed.push(name.clone()),
                FileStatus::Copied | FileStatus::Changed | FileStatus::Unchanged => {}
            }
            files.all.push(name);
        }
        files
    }
}

/// Compiled relevant-file globs.
///
/// `*` stays within one path segment and `**` crosses any number of them.
#[derive(Debug, Clone, Default)]
pub struct RelevantFiles {
    patterns: Vec<Pattern>,
}

impl RelevantFiles {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    /// Compile `patterns`. Blank entries are ignored.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> FilesResult<Self> {
        let patterns = patterns
            .iter()
            .map(AsRef::as_ref)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::new(p).map_err(|e| FilesError::InvalidPattern {
                    pattern: p.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<FilesResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// The source patterns, in configured order.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.as_str().to_string()).collect()
    }

    /// Whether no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `path` matches at least one pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, Self::OPTIONS))
    }

    /// The subsequence of `files.all` matching any pattern.
    #[instrument(skip_all, fields(patterns = self.patterns.len()))]
    pub fn select(&self, files: &CategorizedChangedFiles) -> Vec<String> {
        let relevant: Vec<String> = files
            .all
            .iter()
            .filter(|path| self.matches(path))
            .cloned()
            .collect();
        debug!(count = relevant.len(), "relevant files");
        relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ChangedFile> {
        vec![
            ChangedFile::new("package.json", FileStatus::Modified),
            ChangedFile::new("lib/a.ts", FileStatus::Added),
            ChangedFile::new("lib/nested/b.ts", FileStatus::Renamed),
            ChangedFile::new("docs/old.md", FileStatus::Removed),
            ChangedFile::new("lib/copy.ts", FileStatus::Copied),
            ChangedFile::new("README.md", FileStatus::Modified),
        ]
    }

    #[test]
    fn categorizes_in_provider_order() {
        let files = CategorizedChangedFiles::from_records(&records());
        assert_eq!(files.all.len(), 6);
        assert_eq!(files.all[0], "package.json");
        assert_eq!(files.added, ["lib/a.ts"]);
        assert_eq!(files.modified, ["package.json", "README.md"]);
        assert_eq!(files.removed, ["docs/old.md"]);
        assert_eq!(files.renamed, ["lib/nested/b.ts"]);
    }

    #[test]
    fn subsets_are_contained_in_all() {
        let files = CategorizedChangedFiles::from_records(&records());
        for subset in [&files.added, &files.modified, &files.removed, &files.renamed] {
            assert!(subset.iter().all(|p| files.all.contains(p)));
        }
    }

    #[test]
    fn single_star_stays_in_segment() {
        let relevant = RelevantFiles::new(&["lib/*.ts"]).unwrap();
        assert!(relevant.matches("lib/a.ts"));
        assert!(!relevant.matches("lib/nested/b.ts"));
    }

    #[test]
    fn double_star_recurses() {
        let relevant = RelevantFiles::new(&["lib/**/*.ts"]).unwrap();
        assert!(relevant.matches("lib/nested/b.ts"));
        assert!(relevant.matches("lib/x/y/z.ts"));
        assert!(!relevant.matches("src/a.ts"));
    }

    #[test]
    fn select_keeps_order_of_all() {
        let files = CategorizedChangedFiles::from_records(&records());
        let relevant = RelevantFiles::new(&["**/*.ts", "README.md"]).unwrap();
        assert_eq!(
            relevant.select(&files),
            ["lib/a.ts", "lib/nested/b.ts", "lib/copy.ts", "README.md"]
        );
    }

    #[test]
    fn empty_patterns_select_nothing() {
        let files = CategorizedChangedFiles::from_records(&records());
        let relevant = RelevantFiles::new::<&str>(&[]).unwrap();
        assert!(relevant.is_empty());
        assert!(relevant.select(&files).is_empty());
    }

    #[test]
    fn invalid_pattern_is_named() {
        let err = RelevantFiles::new(&["lib/[a.ts"]).unwrap_err();
        let FilesError::InvalidPattern { pattern, .. } = err;
        assert_eq!(pattern, "lib/[a.ts");
    }
}
