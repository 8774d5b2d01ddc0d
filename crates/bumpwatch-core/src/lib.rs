//! Core library for bumpwatch.
//!
//! Decides, for a commit range, whether a package's version changed and
//! whether to publish.
//!
//! # Modules
//!
//! - [`version`] - Version grammar, diff classification and increments
//! - [`extract`] - Version extraction strategies (json, regex, command)
//! - [`provider`] - Git data provider interface and implementations
//! - [`files`] - Changed-file categorization and relevant-file globs
//! - [`history`] - Version history reconstruction over a commit range
//! - [`decision`] - Publish decision engine
//! - [`check`] - Input validation and the end-to-end check
//! - [`outcome`] - JSON and key/value encoding of check results
//! - [`config`] - Configuration loading and discovery
//! - [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```no_run
//! use bumpwatch_core::check::{CheckOverrides, CheckRequest, run_check};
//! use bumpwatch_core::extract::ShellRunner;
//! use bumpwatch_core::provider::GitCliProvider;
//! use bumpwatch_core::ConfigLoader;
//!
//! let config = ConfigLoader::new().load().expect("failed to load configuration");
//! let overrides = CheckOverrides {
//!     registry_version: Some("1.2.3".into()),
//!     ..CheckOverrides::default()
//! };
//! let request = CheckRequest::from_config(&config, &overrides).expect("invalid input");
//! let outcome = run_check(&GitCliProvider::new("."), &ShellRunner, &request).expect("check failed");
//! println!("publish: {}", outcome.decision.publish);
//! ```
#![deny(unsafe_code)]

pub mod check;

pub mod config;

pub mod decision;

pub mod error;

pub mod extract;

pub mod files;

pub mod history;

pub mod outcome;

pub mod provider;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::Version;
