//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a default so a partial config file is always valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// External program invocation.
    #[serde(default)]
    pub runner: RunnerSettings,

    /// Worker pool and progress cadence.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Input/output locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// Post-success file cleanup.
    #[serde(default)]
    pub cleanup: CleanupSettings,

    /// Output audit markers.
    #[serde(default)]
    pub audit: AuditSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// How each job's external program is launched and judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Path to the external executable (e.g. the ORCA binary).
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Token whose presence in stdout marks a numerically successful run.
    #[serde(default = "default_marker")]
    pub success_marker: String,

    /// Extension of job input files (without the dot).
    #[serde(default = "default_input_extension")]
    pub input_extension: String,

    /// Extension of the captured stdout file.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Suffix appended to the output file name for captured stderr.
    #[serde(default = "default_stderr_suffix")]
    pub stderr_suffix: String,

    /// Extension of the geometry the tool writes on success. Its presence
    /// marks a job as done for discovery.
    #[serde(default = "default_result_extension")]
    pub result_extension: String,

    /// How often a worker checks whether its child has exited.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_executable() -> PathBuf {
    PathBuf::from("/opt/orca/orca")
}

fn default_marker() -> String {
    "HURRAY".to_string()
}

fn default_input_extension() -> String {
    "inp".to_string()
}

fn default_output_extension() -> String {
    "out".to_string()
}

fn default_stderr_suffix() -> String {
    "err".to_string()
}

fn default_result_extension() -> String {
    "xyz".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            success_marker: default_marker(),
            input_extension: default_input_extension(),
            output_extension: default_output_extension(),
            stderr_suffix: default_stderr_suffix(),
            result_extension: default_result_extension(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Worker pool and reporting cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum parallel jobs. `None` means available parallelism minus one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Log a progress line every N processed jobs.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Log an intermediate summary every N processed jobs.
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,
}

fn default_progress_interval() -> usize {
    10
}

fn default_summary_interval() -> usize {
    200
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_workers: None,
            progress_interval: default_progress_interval(),
            summary_interval: default_summary_interval(),
        }
    }
}

impl QueueSettings {
    /// Worker count to use: the configured value, or available parallelism
    /// minus one. Never less than one.
    pub fn effective_workers(&self) -> usize {
        match self.max_workers {
            Some(n) => n.max(1),
            None => default_worker_count(),
        }
    }
}

/// Available parallelism minus one, floor one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Input and output locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Directory searched for input files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,

    /// Directory for `.out` files. Defaults to each input file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Where to write the JSON run report, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
}

/// Post-success cleanup of scratch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Delete scratch files after a successful job.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Markers checked by `audit_outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Every marker must appear in an output for it to count as verified.
    #[serde(default = "default_required_markers")]
    pub required_markers: Vec<String>,
}

fn default_required_markers() -> Vec<String> {
    vec!["HURRAY".to_string(), "ORCA TERMINATED NORMALLY".to_string()]
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            required_markers: default_required_markers(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Append-only log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("flotte_queue.log")
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file: default_log_file(),
        }
    }
}

/// Names of config sections, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Runner,
    Queue,
    Paths,
    Cleanup,
    Audit,
    Logging,
}

impl ConfigSection {
    /// All sections in the order they are written.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Runner,
        ConfigSection::Queue,
        ConfigSection::Paths,
        ConfigSection::Cleanup,
        ConfigSection::Audit,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Runner => "runner",
            ConfigSection::Queue => "queue",
            ConfigSection::Paths => "paths",
            ConfigSection::Cleanup => "cleanup",
            ConfigSection::Audit => "audit",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment line written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Runner => "External program and success detection",
            ConfigSection::Queue => "Worker pool and progress reporting",
            ConfigSection::Paths => "Input, output and report locations",
            ConfigSection::Cleanup => "Scratch file removal after successful jobs",
            ConfigSection::Audit => "Markers required by `flotte audit`",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[runner]"));
        assert!(toml.contains("[queue]"));
        assert!(toml.contains("success_marker = \"HURRAY\""));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[runner]\nexecutable = \"/usr/local/bin/orca\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.runner.executable, PathBuf::from("/usr/local/bin/orca"));
        assert_eq!(parsed.runner.success_marker, "HURRAY");
        assert_eq!(parsed.queue.summary_interval, 200);
        assert!(parsed.cleanup.enabled);
    }

    #[test]
    fn effective_workers_has_floor_of_one() {
        let mut queue = QueueSettings::default();
        assert!(queue.effective_workers() >= 1);

        queue.max_workers = Some(0);
        assert_eq!(queue.effective_workers(), 1);

        queue.max_workers = Some(6);
        assert_eq!(queue.effective_workers(), 6);
    }
}
