//! Log output for covidmap
//!
//! The terminal belongs to the map UI, so tracing output goes to a file in
//! the data directory through a non-blocking writer. The level defaults to
//! `info` and can be changed with `RUST_LOG`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log file name inside the data directory
pub const LOG_FILE_NAME: &str = "covidmap.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs the global subscriber writing to `log_dir/log_file`
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> io::Result<LoggingGuard> {
    let file_appender = file_appender(log_dir, log_file)?;
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Single never-rotated log file, appended to across runs
fn file_appender(log_dir: &Path, log_file: &str) -> io::Result<RollingFileAppender> {
    fs::create_dir_all(log_dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(log_file)
        .build(log_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
