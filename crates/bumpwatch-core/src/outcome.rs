//! Produced interface of a check run.
//!
//! A [`CheckOutcome`] can be emitted either as one JSON document or as
//! ordered key/value pairs suitable for a CI step output file.

use std::fs::OpenOptions;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::decision::PublishDecision;
use crate::history::VersionMetadata;

/// Errors from encoding or writing outputs.
#[derive(Error, Debug)]
pub enum OutputError {
    /// A structured value could not be encoded.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    /// The output file could not be written.
    #[error("failed to write outputs to {path}: {source}")]
    Io {
        /// Output file.
        path: Utf8PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Result alias for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// History plus decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Reconstructed history.
    pub metadata: VersionMetadata,
    /// Publish decision.
    pub decision: PublishDecision,
}

impl CheckOutcome {
    /// Flatten into ordered output pairs.
    ///
    /// Optional values become empty strings; lists and nested records are
    /// compact JSON.
    pub fn to_key_values(&self) -> OutputResult<Vec<(&'static str, String)>> {
        let meta = &self.metadata;
        let files = &meta.changed_files;
        Ok(vec![
            ("changed", meta.changed.to_string()),
            ("old_version", meta.old_version.to_string()),
            ("new_version", meta.new_version.to_string()),
            (
                "type",
                meta.kind.map(|k| k.to_string()).unwrap_or_default(),
            ),
            (
                "commit_responsible",
                meta.commit_responsible.clone().unwrap_or_default(),
            ),
            ("commit_base", meta.commit_base.clone()),
            ("commit_head", meta.commit_head.clone()),
            ("changed_files", serde_json::to_string(files)?),
            ("changed_files_added", serde_json::to_string(&files.added)?),
            (
                "changed_files_modified",
                serde_json::to_string(&files.modified)?,
            ),
            ("changed_files_removed", serde_json::to_string(&files.removed)?),
            ("changed_files_renamed", serde_json::to_string(&files.renamed)?),
            ("changes", serde_json::to_string(&meta.changes)?),
            ("publish", self.decision.publish.to_string()),
            (
                "version",
                self.decision
                    .version
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            ("reason", self.decision.reason.clone()),
        ])
    }
}

/// Render pairs in step-output syntax.
///
/// Single-line values are written as `name=value`. Multi-line values use
/// `name<<DELIM`, with a delimiter that does not occur in the value.
pub fn render_key_values(pairs: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (name, value) in pairs {
        if value.contains('\n') || value.contains('\r') {
            let delimiter = delimiter_for(value);
            out.push_str(&format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"));
        } else {
            out.push_str(&format!("{name}={value}\n"));
        }
    }
    out
}

fn delimiter_for(value: &str) -> String {
    let mut delimiter = "BUMPWATCH_EOF".to_string();
    let mut n = 0u32;
    while value.contains(&delimiter) {
        n += 1;
        delimiter = format!("BUMPWATCH_EOF_{n}");
    }
    delimiter
}

/// Append `pairs` to the output file at `path`, creating it if needed.
#[instrument(skip(pairs), fields(count = pairs.len()))]
pub fn write_key_values(path: &Utf8Path, pairs: &[(&str, String)]) -> OutputResult<()> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(render_key_values(pairs).as_bytes())
        .map_err(io_err)?;
    debug!("outputs written");
    Ok(())
}
