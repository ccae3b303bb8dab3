use std::io;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::models::config::LoggingConfig;

const LOG_FILE_NAME: &str = "quality-loop.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logger implementation using tracing
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initialize the global subscriber from the logging configuration
    ///
    /// Stderr gets pretty or JSON output depending on `format`. When
    /// `log_dir` is set, JSON lines also go to a rolling file there; stderr
    /// output is then kept only if `enable_stderr` is set.
    ///
    /// # Errors
    /// Returns an error for an invalid level or rotation, or when a global
    /// subscriber is already installed
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = parse_log_level(&config.level)?;
        let mut layers: Vec<BoxedLayer> = Vec::new();

        let guard = if let Some(log_dir) = &config.log_dir {
            let appender = file_appender(log_dir, &config.rotation)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            // File output is always JSON for structured ingestion
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter(level))
                    .boxed(),
            );
            Some(guard)
        } else {
            None
        };

        if config.log_dir.is_none() || config.enable_stderr {
            let layer = if config.format == "json" {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_filter(env_filter(level))
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter(level))
                    .boxed()
            };
            layers.push(layer);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        tracing::debug!(
            level = %config.level,
            format = %config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn file_appender(log_dir: &std::path::Path, rotation: &str) -> Result<RollingFileAppender> {
    match rotation {
        "daily" => Ok(rolling::daily(log_dir, LOG_FILE_NAME)),
        "hourly" => Ok(rolling::hourly(log_dir, LOG_FILE_NAME)),
        "never" => Ok(rolling::never(log_dir, LOG_FILE_NAME)),
        other => anyhow::bail!("Invalid log rotation: {other}"),
    }
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}
