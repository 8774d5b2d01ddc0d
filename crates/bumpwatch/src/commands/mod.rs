//! Command implementations

pub mod check;

pub mod history;

pub mod increment;

pub mod info;

use anyhow::Context;
use bumpwatch_core::check::CheckOverrides;
use bumpwatch_core::history::VersionMetadata;
use bumpwatch_core::provider::{GitCliProvider, GitProvider, MemoryProvider};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::debug;

/// Commit range and tracked-file flags shared by `check` and `history`.
#[derive(Args, Debug, Default, Clone)]
pub struct RangeArgs {
    /// Base commit (omit, empty or all zeros to use the branch point)
    #[arg(long)]
    pub base: Option<String>,

    /// Head commit or ref
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Path of the tracked file (overrides `track.file`)
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// Extraction method: json, regex:<pattern> or command:<shell>
    #[arg(long, value_name = "METHOD")]
    pub extraction: Option<String>,

    /// Read commits and contents from a JSON snapshot instead of git
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<Utf8PathBuf>,
}

impl RangeArgs {
    /// Flag values as check overrides.
    pub fn overrides(&self) -> CheckOverrides {
        CheckOverrides {
            base: self.base.clone(),
            head: Some(self.head.clone()),
            file: self.file.clone(),
            extraction: self.extraction.clone(),
            ..CheckOverrides::default()
        }
    }

    /// The git data source for this invocation.
    pub fn provider(&self, cwd: &Utf8Path) -> anyhow::Result<Box<dyn GitProvider>> {
        match &self.snapshot {
            Some(path) => {
                let path = cwd.join(path);
                debug!(snapshot = %path, "using snapshot provider");
                let provider = MemoryProvider::from_json_file(&path)
                    .with_context(|| format!("failed to load snapshot {path}"))?;
                Ok(Box::new(provider))
            }
            None => {
                debug!(root = %cwd, "using git provider");
                Ok(Box::new(GitCliProvider::new(cwd)))
            }
        }
    }
}

/// Human-readable history summary.
pub(crate) fn print_metadata(meta: &VersionMetadata) {
    let base = short(&meta.commit_base);
    let head = short(&meta.commit_head);
    println!("{} {}..{}", "Range".dimmed(), base, head);

    if meta.changed {
        let kind = meta.kind.map(|k| k.to_string()).unwrap_or_default();
        println!(
            "{} {} -> {} ({})",
            "Version".dimmed(),
            meta.old_version.to_string().yellow(),
            meta.new_version.to_string().green().bold(),
            kind.cyan()
        );
        if let Some(ref sha) = meta.commit_responsible {
            println!("{} {}", "Bumped in".dimmed(), short(sha));
        }
    } else {
        println!(
            "{} {} {}",
            "Version".dimmed(),
            meta.new_version,
            "(unchanged)".dimmed()
        );
    }

    if meta.changes.len() > 1 {
        println!();
        println!("{}", "Changes".bold().underline());
        for change in &meta.changes {
            println!(
                "  {} {} -> {} ({})",
                short(&change.commit),
                change.old_version,
                change.new_version,
                change.kind
            );
        }
    }

    let files = &meta.changed_files;
    println!();
    println!(
        "{} {} ({} added, {} modified, {} removed, {} renamed)",
        "Changed files".dimmed(),
        files.all.len(),
        files.added.len(),
        files.modified.len(),
        files.removed.len(),
        files.renamed.len()
    );
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_truncates_long_shas() {
        assert_eq!(short("0123456789abcdef"), "0123456");
        assert_eq!(short("abc"), "abc");
    }

    #[test]
    fn overrides_carry_flags() {
        let args = RangeArgs {
            base: Some("a1".into()),
            head: "b2".into(),
            file: Some("Cargo.toml".into()),
            extraction: None,
            snapshot: None,
        };
        let ov = args.overrides();
        assert_eq!(ov.base.as_deref(), Some("a1"));
        assert_eq!(ov.head.as_deref(), Some("b2"));
        assert_eq!(ov.file.as_deref(), Some("Cargo.toml"));
        assert!(ov.registry_version.is_none());
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let args = RangeArgs {
            snapshot: Some("nope.json".into()),
            ..RangeArgs::default()
        };
        assert!(args.provider(Utf8Path::new("/nonexistent")).is_err());
    }
}
