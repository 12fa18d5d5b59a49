//! Log output setup
//!
//! Installs the global `tracing` subscriber: stdout always, plus a daily
//! rolling file when `logging.log_dir` is set.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const LOG_FILE_PREFIX: &str = "edge-dispatch.log";

/// Keeps the background file writer alive; drop it only at process exit
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
fn build_filter(level: &str) -> io::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid log level '{level}': {e}"),
            )
        }),
    }
}

/// Install the global subscriber
///
/// Returns an error if the level is not a valid filter, the log directory
/// cannot be created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> io::Result<LogGuard> {
    let filter = build_filter(&config.level)?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));
    let stdout_layer = if config.json {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };

    let mut layers = vec![stdout_layer];
    let mut file_guard = None;

    if let Some(dir) = config.log_dir.as_deref() {
        let dir = Path::new(dir);
        std::fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_writer(writer);
        let file_layer = if config.json {
            file_layer.json().flatten_event(true).boxed()
        } else {
            file_layer.boxed()
        };
        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
