//! Logging types.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Raise the level by a `-v` count.
    pub fn raised_by(self, verbosity: u8) -> LogLevel {
        match verbosity {
            0 => self,
            1 if self > LogLevel::Debug => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Where log output goes.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum level when RUST_LOG is not set.
    pub level: LogLevel,
    /// Append-only log file, if any.
    pub file: Option<std::path::PathBuf>,
    /// Emit ANSI colours on the console.
    pub ansi: bool,
}
