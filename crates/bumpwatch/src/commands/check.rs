//! Check command: reconstruct the version history of a commit range and
//! decide whether to publish.

use std::time::Duration;

use anyhow::Context;
use bumpwatch_core::check::{CheckRequest, run_check};
use bumpwatch_core::config::Config;
use bumpwatch_core::extract::ShellRunner;
use bumpwatch_core::outcome::{CheckOutcome, write_key_values};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument};

use super::{RangeArgs, print_metadata};

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Commit range and tracked file.
    #[command(flatten)]
    pub range: RangeArgs,

    /// Latest version published to the registry
    #[arg(long, value_name = "VERSION")]
    pub registry_version: Option<String>,

    /// Glob for files whose change warrants a pre-release (repeatable)
    #[arg(long = "relevant", value_name = "GLOB")]
    pub relevant_files: Vec<String>,

    /// Increment for automatic publishes
    #[arg(long, value_name = "TYPE")]
    pub increment: Option<String>,

    /// Append key=value outputs to this file
    #[arg(long, env = "GITHUB_OUTPUT", value_name = "FILE")]
    pub output_file: Option<Utf8PathBuf>,
}

/// Run the check and report the decision.
#[instrument(name = "cmd_check", skip_all, fields(head = %args.range.head))]
pub fn cmd_check(
    args: CheckArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let mut overrides = args.range.overrides();
    overrides.registry_version = args.registry_version.clone();
    overrides.relevant_files = args.relevant_files.clone();
    overrides.increment = args.increment.clone();

    let request = CheckRequest::from_config(config, &overrides)?;
    let provider = args.range.provider(cwd)?;
    debug!(registry = %request.registry_version, "request validated");

    let spinner = (!global_json).then(|| {
        let sp = ProgressBar::new_spinner();
        sp.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        sp.set_message(format!("Reading history of {}...", request.tracked.path));
        sp.enable_steady_tick(Duration::from_millis(80));
        sp
    });

    let result = run_check(provider.as_ref(), &ShellRunner, &request);
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let outcome = result?;

    if let Some(ref path) = args.output_file {
        let path = cwd.join(path);
        let pairs = outcome.to_key_values()?;
        write_key_values(&path, &pairs)
            .with_context(|| format!("failed to write outputs to {path}"))?;
        info!(path = %path, "outputs written");
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &CheckOutcome) {
    print_metadata(&outcome.metadata);
    println!();

    let decision = &outcome.decision;
    match decision.version {
        Some(version) if decision.publish => {
            println!("{} {}", "Publish".green().bold(), version.to_string().bold());
        }
        _ => println!("{}", "Nothing to publish".yellow().bold()),
    }

    // The trailing metadata line is for machine consumers.
    for line in decision
        .reason
        .lines()
        .take_while(|line| !line.starts_with("Metadata:"))
        .filter(|line| !line.is_empty())
    {
        println!("  {}", line.dimmed());
    }
}
