//! `tracing` subscriber setup for survey runs.
//!
//! Levels used across the workspace:
//!
//! - `error`: structural failures that halt a run
//! - `warn`: skipped tables, text columns, absent optional columns
//! - `info`: stage progress, exclusion counts, per-table row counts
//! - `debug`: per-derivation timing, single-PSU strata, empty denominators
//! - `trace`: row-level events; pupil identifiers pass through [`redact_value`]
//!
//! ```ignore
//! use sdd_pipeline::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::from_verbosity(1))?;
//! ```

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Workspace crates; everything else logs at `warn` unless `RUST_LOG` says otherwise.
const CRATES: [&str; 5] = [
    "sdd_derive",
    "sdd_ingest",
    "sdd_model",
    "sdd_pipeline",
    "sdd_tabulate",
];

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Stands in for row-level values unless `log_data` is on.
pub const REDACTED_VALUE: &str = "[REDACTED]";

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Acquire)
}

/// `value` if row-level logging is on, [`REDACTED_VALUE`] otherwise.
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One human-readable line per event.
    #[default]
    Text,
    /// One JSON object per event, fields under `fields`.
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub with_timestamps: bool,
    pub with_ansi: bool,
    /// Append here instead of writing to stderr.
    pub log_file: Option<PathBuf>,
    /// Pupil identifiers are personal data; off by default.
    pub log_data: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_timestamps: true,
            with_ansi: true,
            log_file: None,
            log_data: false,
        }
    }
}

impl LogConfig {
    /// 0 is info, 1 is debug, 2 or more is trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_log_data(mut self, enable: bool) -> Self {
        self.log_data = enable;
        self
    }
}

/// Installs the global subscriber, writing to `log_file` or stderr.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            init_logging_with_writer(config, Mutex::new(file))
        }
        None => init_logging_with_writer(config, io::stderr),
    }
}

/// Installs the global subscriber over any writer.
///
/// # Errors
///
/// Fails if a subscriber is already set.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Release);
    subscriber(config, writer)
        .try_init()
        .context("install tracing subscriber")
}

fn subscriber<W>(config: &LogConfig, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (config.format, config.with_timestamps)
    {
        (LogFormat::Json, true) => fmt::layer().json().with_writer(writer).boxed(),
        (LogFormat::Json, false) => fmt::layer().json().without_time().with_writer(writer).boxed(),
        (LogFormat::Text, true) => fmt::layer()
            .compact()
            .with_ansi(config.with_ansi)
            .with_writer(writer)
            .boxed(),
        (LogFormat::Text, false) => fmt::layer()
            .compact()
            .without_time()
            .with_ansi(config.with_ansi)
            .with_writer(writer)
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter(config.level))
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}
