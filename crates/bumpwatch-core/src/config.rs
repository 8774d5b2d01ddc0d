//! Configuration loading and discovery.
//!
//! Sources are layered with figment, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `~/.config/bumpwatch/config.<ext>` (user config)
//! 3. `.bumpwatch.<ext>` or `bumpwatch.<ext>` in the working directory or
//!    the nearest parent, stopping at a `.git` boundary
//! 4. Files passed explicitly (`--config`)
//!
//! Where `<ext>` is one of `toml`, `yaml`, `yml`, `json`.
//!
//! Values are kept as plain strings here; they are validated when a check
//! request is built so errors can name the offending field.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use bumpwatch_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::from(".");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! println!("tracking {}", config.track.file);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::history::DEFAULT_FETCH_CONCURRENCY;

/// The configuration for bumpwatch.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files. File logging is off when unset.
    pub log_dir: Option<Utf8PathBuf>,
    /// What to track.
    pub track: TrackConfig,
    /// How to decide on publishing.
    pub publish: PublishConfig,
}

/// The tracked file and how its version is read.
///
/// ```toml
/// [track]
/// file = "Cargo.toml"
/// extraction = 'regex:(?m)^version = "([^"]+)"'
/// fetch_concurrency = 4
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackConfig {
    /// Path of the tracked file relative to the repository root.
    pub file: String,
    /// `json`, `regex:<pattern>` or `command:<shell command>`.
    pub extraction: String,
    /// Concurrent content fetches.
    pub fetch_concurrency: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            file: "package.json".to_string(),
            extraction: "json".to_string(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Publish decision inputs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishConfig {
    /// Increment applied when publishing without a detected bump.
    pub increment: String,
    /// Glob patterns that make a changed file relevant.
    pub relevant_files: Vec<String>,
    /// Latest version known to the registry.
    pub registry_version: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            increment: "pre-release".to_string(),
            relevant_files: Vec::new(),
            registry_version: None,
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "bumpwatch";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that includes user config and stops at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Walk up from `path` looking for a project config file.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/bumpwatch/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file. Later files take precedence.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(ConfigError::Missing(file.clone()));
            }
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(
            log_level = config.log_level.as_str(),
            file = %config.track.file,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Walk up from `start`; the directory holding the boundary marker is
    /// the last one searched.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
                [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                    .into_iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.is_file())
            });
            if found.is_some() {
                return found;
            }
            if self
                .boundary_marker
                .as_ref()
                .is_some_and(|marker| dir.join(marker).exists())
            {
                tracing::debug!(boundary = %dir, "stopped config search");
                break;
            }
        }
        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .find_project_config(start.as_ref())
}

/// The user config directory (`~/.config/bumpwatch/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf()).ok()
}
