//! Tracing setup: a stderr stream plus an append-only log file.

use std::io;
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file path has no file name: {0}")]
    BadPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber.
///
/// Stderr follows `RUST_LOG` (default `info`, or `debug` when `debug` is
/// set). The log file gets warnings and errors, or everything at debug
/// level. Keep the returned guard alive until exit so buffered lines are
/// flushed.
pub fn init(log_file: &Path, debug: bool) -> Result<WorkerGuard, LogError> {
    let file_name = log_file
        .file_name()
        .ok_or_else(|| LogError::BadPath(log_file.display().to_string()))?;
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let file_appender = rolling::never(dir, file_name);
    let (file_writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(file_level);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
