//! Info command: show package information and the resolved configuration.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use bumpwatch_core::config::{self, Config};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_config_dir: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    file: String,
    extraction: String,
    fetch_concurrency: usize,
    increment: String,
    relevant_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_version: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            user_config_dir: config::user_config_dir().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            file: config.track.file.clone(),
            extraction: config.track.extraction.clone(),
            fetch_concurrency: config.track.fetch_concurrency,
            increment: config.publish.increment.clone(),
            relevant_files: config.publish.relevant_files.clone(),
            registry_version: config.publish.registry_version.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package and configuration information.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let pkg = &info.package;
    println!("{} {}", pkg.name.bold(), pkg.version.green());
    if !pkg.description.is_empty() {
        println!("{}", pkg.description);
    }
    if !pkg.license.is_empty() {
        println!("{}: {}", "License".dimmed(), pkg.license);
    }
    if !pkg.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), pkg.repository.cyan());
    }

    let cfg = &info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match cfg.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    if let Some(ref dir) = cfg.user_config_dir {
        println!("{}: {}", "User config dir".dimmed(), dir);
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "Tracking".bold().underline());
    println!("{}: {}", "File".dimmed(), cfg.file.cyan());
    println!("{}: {}", "Extraction".dimmed(), cfg.extraction);
    println!("{}: {}", "Fetch concurrency".dimmed(), cfg.fetch_concurrency);

    println!();
    println!("{}", "Publishing".bold().underline());
    println!("{}: {}", "Increment".dimmed(), cfg.increment);
    match cfg.registry_version {
        Some(ref v) => println!("{}: {}", "Registry version".dimmed(), v.green()),
        None => println!("{}: {}", "Registry version".dimmed(), "not set".yellow()),
    }
    if cfg.relevant_files.is_empty() {
        println!("{}: {}", "Relevant files".dimmed(), "none".dimmed());
    } else {
        println!("{}:", "Relevant files".dimmed());
        for pattern in &cfg.relevant_files {
            println!("  {pattern}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cwd() -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn test_cmd_info_text_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn test_cmd_info_json_via_global() {
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn test_config_info_reports_defaults() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let info = ConfigInfo::from_config(&Config::default(), &cwd);
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.file, "package.json");
        assert_eq!(info.extraction, "json");
        assert_eq!(info.fetch_concurrency, 8);
        assert_eq!(info.increment, "pre-release");
        assert!(info.registry_version.is_none());
    }
}
