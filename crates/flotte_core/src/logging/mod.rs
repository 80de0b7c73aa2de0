//! Logging infrastructure for Flotte.
//!
//! Queue activity is reported through `tracing`. The binary installs one
//! subscriber that writes timestamped lines to stderr and appends the same
//! lines (without colour) to a log file, so long-running queues leave an
//! audit trail next to their inputs.
//!
//! # Example
//!
//! ```no_run
//! use flotte_core::logging::{init_tracing, LogConfig, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Info,
//!     file: Some("flotte_queue.log".into()),
//!     ansi: true,
//! };
//! let _guard = init_tracing(&config).unwrap();
//! tracing::info!("queue starting");
//! ```

mod types;

pub use types::{LogConfig, LogLevel};

use std::fs::{self, OpenOptions};
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the configured level
/// - Outputs to stderr with timestamps
/// - Appends to the configured log file (if any)
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the program.
pub fn init_tracing(config: &LogConfig) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi)
        .with_target(false);

    let (file_layer, guard) = match &config.file {
        Some(path) if !path.as_os_str().is_empty() => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
