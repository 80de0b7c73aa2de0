//! Configuration management for Flotte.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Defaults for every field, so partial files load cleanly
//!
//! # Example
//!
//! ```no_run
//! use flotte_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("flotte.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Executable: {}", config.settings().runner.executable.display());
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    default_worker_count, AuditSettings, CleanupSettings, ConfigSection, LoggingSettings,
    PathSettings, QueueSettings, RunnerSettings, Settings,
};
