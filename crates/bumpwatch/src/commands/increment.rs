//! Increment command: print the version that follows a given one.

use bumpwatch_core::Version;
use bumpwatch_core::version::{IncrementType, increment};
use clap::Args;
use serde::Serialize;
use tracing::instrument;

/// Arguments for the `increment` subcommand.
#[derive(Args, Debug)]
pub struct IncrementArgs {
    /// Current version (major.minor.patch[-N])
    pub version: String,

    /// Which component to increment
    #[arg(short = 't', long = "type", value_enum, default_value_t)]
    pub kind: IncrementType,
}

#[derive(Serialize)]
struct IncrementReport {
    version: Version,
    #[serde(rename = "type")]
    kind: IncrementType,
    next: Version,
}

/// Print the next version.
#[instrument(name = "cmd_increment", skip_all, fields(version = %args.version, kind = %args.kind))]
pub fn cmd_increment(args: IncrementArgs, global_json: bool) -> anyhow::Result<()> {
    let version = Version::parse(args.version.trim())?;
    let next = increment(&version, args.kind)?;

    if global_json {
        let report = IncrementReport {
            version,
            kind: args.kind,
            next,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{next}");
    }
    Ok(())
}
