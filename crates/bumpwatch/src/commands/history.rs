//! History command: reconstruct the version history without deciding.

use bumpwatch_core::config::Config;
use bumpwatch_core::extract::ShellRunner;
use bumpwatch_core::history::reconstruct;
use camino::Utf8Path;
use clap::Args;
use tracing::{debug, instrument};

use super::{RangeArgs, print_metadata};

/// Arguments for the `history` subcommand.
#[derive(Args, Debug, Default)]
pub struct HistoryArgs {
    /// Commit range and tracked file.
    #[command(flatten)]
    pub range: RangeArgs,
}

/// Print the version metadata for a commit range.
#[instrument(name = "cmd_history", skip_all, fields(head = %args.range.head))]
pub fn cmd_history(
    args: HistoryArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let overrides = args.range.overrides();
    let range = overrides.range()?;
    let tracked = overrides.tracked(config)?;
    let provider = args.range.provider(cwd)?;

    let metadata = reconstruct(provider.as_ref(), &ShellRunner, &range, &tracked)?;
    debug!(changes = metadata.changes.len(), "history reconstructed");

    if global_json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        print_metadata(&metadata);
    }
    Ok(())
}
