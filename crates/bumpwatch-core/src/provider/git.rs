//! Provider backed by the local `git` binary.
//!
//! Shells out to `git` for every query, so the user's own configuration
//! (alternates, shallow clones, credential helpers) applies unchanged.

use std::collections::HashSet;
use std::process::Command;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::Utf8PathBuf;
use tracing::{debug, instrument};

use super::{
    BranchPoint, BranchPointKind, ChangedFile, Commit, Comparison, FileContent, FileStatus,
    GitProvider, ProviderError, ProviderResult,
};

/// Field separator for `git log` output.
const SEP: char = '\x1f';
const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%s";

/// A [`GitProvider`] that runs `git -C <root> ...`.
#[derive(Debug, Clone)]
pub struct GitCliProvider {
    root: Utf8PathBuf,
}

impl GitCliProvider {
    /// Query the repository containing `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `reference` to a full commit SHA.
    #[instrument(skip(self))]
    pub fn resolve(&self, reference: &str) -> ProviderResult<String> {
        let spec = format!("{reference}^{{commit}}");
        match self.git(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(out) => Ok(out.trim().to_string()),
            Err(ProviderError::Unavailable { .. }) => {
                Err(ProviderError::UnknownCommit(reference.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn git(&self, args: &[&str]) -> ProviderResult<String> {
        self.git_bytes(args)
            .map(|out| String::from_utf8_lossy(&out).to_string())
    }

    fn git_bytes(&self, args: &[&str]) -> ProviderResult<Vec<u8>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.root.as_str())
            .args(args)
            .output()?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        Err(ProviderError::Unavailable {
            operation: format!("git {}", args.first().unwrap_or(&"")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl GitProvider for GitCliProvider {
    #[instrument(skip(self))]
    fn compare_commits(&self, base: &str, head: &str) -> ProviderResult<Comparison> {
        let base_sha = self.resolve(base)?;
        let head_sha = self.resolve(head)?;

        let base_commit = parse_log(&self.git(&["log", "-1", LOG_FORMAT, &base_sha])?)
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnknownCommit(base.to_string()))?;

        let range = format!("{base_sha}..{head_sha}");
        let commits = parse_log(&self.git(&[
            "log",
            "--reverse",
            "--topo-order",
            LOG_FORMAT,
            &range,
        ])?);

        let files = parse_name_status(&self.git(&[
            "diff",
            "--name-status",
            "-M",
            &base_sha,
            &head_sha,
        ])?);

        debug!(commits = commits.len(), files = files.len(), "compared range");
        Ok(Comparison {
            files: Some(files),
            commits,
            base_commit,
        })
    }

    #[instrument(skip(self))]
    fn get_content(&self, path: &str, reference: &str) -> ProviderResult<FileContent> {
        let object = format!("{reference}:{path}");
        match self.git_bytes(&["show", &object]) {
            Ok(raw) => Ok(FileContent {
                content: STANDARD.encode(raw),
            }),
            Err(ProviderError::Unavailable { message, .. })
                if message.contains("does not exist")
                    || message.contains("exists on disk, but not in") =>
            {
                Err(ProviderError::NotFound {
                    path: path.to_string(),
                    reference: reference.to_string(),
                })
            }
            Err(ProviderError::Unavailable { message, .. })
                if message.contains("invalid object name") =>
            {
                Err(ProviderError::UnknownCommit(reference.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn backtrack_to_first_branch_ref(&self, head: &str) -> ProviderResult<BranchPoint> {
        let head_sha = self.resolve(head)?;
        let chain: Vec<String> = lines(&self.git(&["rev-list", "--first-parent", &head_sha])?);

        // Tips of refs that do not already contain head.
        let tips = lines(&self.git(&[
            "for-each-ref",
            "--no-contains",
            &head_sha,
            "--format=%(objectname)",
        ])?);

        if !tips.is_empty() {
            let mut args = vec!["rev-list", head_sha.as_str(), "--not"];
            args.extend(tips.iter().map(String::as_str));
            let own: HashSet<String> = lines(&self.git(&args)?).into_iter().collect();

            if let Some(sha) = chain.iter().find(|sha| !own.contains(*sha)) {
                debug!(%sha, "found branch point");
                return Ok(BranchPoint {
                    sha: sha.clone(),
                    kind: BranchPointKind::BranchPoint,
                });
            }
        }

        let root = chain
            .last()
            .cloned()
            .ok_or_else(|| ProviderError::UnknownCommit(head.to_string()))?;
        debug!(sha = %root, "reached root commit");
        Ok(BranchPoint {
            sha: root,
            kind: BranchPointKind::Initial,
        })
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `%H<US>%P<US>%s` lines.
fn parse_log(output: &str) -> Vec<Commit> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.splitn(3, SEP);
            let sha = fields.next().unwrap_or_default().to_string();
            let parents = fields
                .next()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let message = fields.next().unwrap_or_default().to_string();
            Commit {
                sha,
                parents,
                message,
            }
        })
        .collect()
}

/// Parse `git diff --name-status` output.
///
/// Renames and copies report their destination path.
fn parse_name_status(output: &str) -> Vec<ChangedFile> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let code = fields.next()?;
            let paths: Vec<&str> = fields.collect();
            let status = match code.chars().next()? {
                'A' => FileStatus::Added,
                'M' => FileStatus::Modified,
                'D' => FileStatus::Removed,
                'R' => FileStatus::Renamed,
                'C' => FileStatus::Copied,
                'T' | 'U' => FileStatus::Changed,
                _ => return None,
            };
            let filename = paths.last()?;
            Some(ChangedFile::new(*filename, status))
        })
        .collect()
}
