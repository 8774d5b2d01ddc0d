//! Logging setup.
//!
//! Stdout carries command results only. Human-readable logs go to stderr,
//! and a JSONL copy is written to a daily-rolled file when a log location
//! is configured through `BUMPWATCH_LOG_PATH`, `BUMPWATCH_LOG_DIR` or the
//! `log_dir` config key (in that order of precedence).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "BUMPWATCH_LOG_PATH";
const ENV_LOG_DIR: &str = "BUMPWATCH_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where logs should go.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name used for the log file name.
    pub service: String,
    /// Explicit log file path (`BUMPWATCH_LOG_PATH`).
    pub log_path: Option<PathBuf>,
    /// Log directory (`BUMPWATCH_LOG_DIR`, then `log_dir` from config).
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Read the environment, falling back to `config_log_dir`.
    pub fn from_env(config_log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_path: std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
            log_dir: std::env::var_os(ENV_LOG_DIR)
                .map(PathBuf::from)
                .or(config_log_dir),
        }
    }

    fn target(&self) -> Result<Option<LogTarget>> {
        if let Some(path) = &self.log_path {
            return LogTarget::from_path(path).map(Some);
        }
        self.log_dir
            .as_deref()
            .map(|dir| LogTarget::in_dir(dir, &self.service))
            .transpose()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

impl LogTarget {
    fn in_dir(dir: &Path, service: &str) -> Result<Self> {
        let target = Self {
            dir: dir.to_path_buf(),
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("{ENV_LOG_PATH} must end in a UTF-8 file name"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let target = Self {
            dir: dir.to_path_buf(),
            file_name,
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn ensure_writable(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log directory {}", self.dir.display()))?;
        let path = self.dir.join(&self.file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(())
    }

    fn writer(&self) -> (NonBlocking, WorkerGuard) {
        let appender = tracing_appender::rolling::daily(&self.dir, &self.file_name);
        tracing_appender::non_blocking(appender)
    }
}

/// Keeps the background log writer alive; hold it until exit.
pub struct ObservabilityGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a configured log location cannot be written.
pub fn init_observability(cfg: &ObservabilityConfig, filter: EnvFilter) -> Result<ObservabilityGuard> {
    let target = cfg.target()?;
    let (file_layer, file_guard) = match target {
        Some(target) => {
            let (writer, guard) = target.writer();
            (Some(JsonlLayer { writer }), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::debug!(file_logging = file_guard.is_some(), "logging initialized");
    Ok(ObservabilityGuard {
        _file_guard: file_guard,
    })
}

/// Build the level filter.
///
/// Priority: quiet flag > verbose flag > `RUST_LOG` > configured level.
/// The default level applies to bumpwatch crates only; dependencies stay
/// at `warn`.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,bumpwatch={default_level},bumpwatch_core={default_level}"
            ))
        }),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Writes one JSON object per event, merging the fields of enclosing spans.
struct JsonlLayer<W> {
    writer: W,
}

/// Span fields captured at creation and on `record`.
struct SpanFields(Map<String, Value>);

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut entry = Map::new();
        entry.insert("ts_ms".into(), Value::from(unix_millis()));
        entry.insert("level".into(), Value::from(meta.level().as_str().to_lowercase()));
        entry.insert("target".into(), Value::from(meta.target()));

        if let Some(scope) = ctx.event_scope(event) {
            let mut spans = Vec::new();
            for span in scope.from_root() {
                spans.push(Value::from(span.name()));
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    entry.extend(fields.0.clone());
                }
            }
            entry.insert("spans".into(), Value::Array(spans));
        }

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        entry.extend(fields.0);

        let mut writer = self.writer.make_writer();
        if let Ok(mut line) = serde_json::to_vec(&Value::Object(entry)) {
            line.push(b'\n');
            let _ = writer.write_all(&line);
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().into(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().into(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().into(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().into(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().into(), Value::from(format!("{value:?}")));
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(log_path: Option<PathBuf>, log_dir: Option<PathBuf>) -> ObservabilityConfig {
        ObservabilityConfig {
            service: "demo".into(),
            log_path,
            log_dir,
        }
    }

    #[test]
    fn quiet_wins() {
        assert_eq!(env_filter(true, 3, "debug").to_string(), "error");
    }

    #[test]
    fn verbose_maps_to_debug_and_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 2, "info").to_string(), "trace");
    }

    #[test]
    fn no_location_means_no_file_logging() {
        assert_eq!(cfg(None, None).target().unwrap(), None);
    }

    #[test]
    fn path_takes_precedence_over_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("custom.jsonl");
        let target = cfg(Some(file), Some(tmp.path().join("other")))
            .target()
            .unwrap()
            .unwrap();
        assert_eq!(target.dir, tmp.path());
        assert_eq!(target.file_name, "custom.jsonl");
    }

    #[test]
    fn dir_gets_service_file_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("logs");
        let target = cfg(None, Some(dir.clone())).target().unwrap().unwrap();
        assert_eq!(target.dir, dir);
        assert_eq!(target.file_name, "demo.jsonl");
        assert!(dir.join("demo.jsonl").is_file());
    }

    #[test]
    fn field_map_keeps_types() {
        let mut fields = FieldMap::default();
        fields.0.insert("n".into(), Value::from(3u64));
        assert_eq!(fields.0["n"], 3);
        assert!(unix_millis() > 0);
    }
}
