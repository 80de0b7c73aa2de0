//! Per-job result types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::jobs::JobDescriptor;

/// Failure raised by the runner itself rather than by the external program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// The configured executable does not exist.
    #[error("Executable not found at: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// The process could not be started.
    #[error("Failed to spawn {}: {message}", .executable.display())]
    SpawnFailed { executable: PathBuf, message: String },

    /// File or pipe I/O failed.
    #[error("I/O error in {operation}: {message}")]
    Io { operation: String, message: String },
}

impl RunnerError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: source.to_string(),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Exit code 0 and the success marker was found.
    Success,
    /// Exit code 0 but no success marker ("completed but not verified").
    /// Usually a convergence problem in the external program.
    MarkerMissing,
    /// Non-zero exit code, or no exit code when killed by a signal.
    ProcessError {
        exit_code: Option<i32>,
        marker_found: bool,
    },
    /// Abandoned before spawning because shutdown was requested.
    ShutdownRequested,
    /// The runner failed before or while driving the process.
    Errored(RunnerError),
}

impl JobOutcome {
    /// Classify a finished process.
    ///
    /// Success requires both a zero exit code and the marker; either one
    /// alone is a failure.
    pub fn classify(exit_code: Option<i32>, marker_found: bool) -> Self {
        match (exit_code, marker_found) {
            (Some(0), true) => JobOutcome::Success,
            (Some(0), false) => JobOutcome::MarkerMissing,
            (exit_code, marker_found) => JobOutcome::ProcessError {
                exit_code,
                marker_found,
            },
        }
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::MarkerMissing => "marker_missing",
            JobOutcome::ProcessError { .. } => "process_error",
            JobOutcome::ShutdownRequested => "shutdown_requested",
            JobOutcome::Errored(_) => "error",
        }
    }
}

/// Result of running one job. Created once by the runner, then immutable.
#[derive(Debug, Clone)]
pub struct JobResult {
    job_name: String,
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    elapsed: Duration,
    completed_at: DateTime<Local>,
    outcome: JobOutcome,
}

impl JobResult {
    /// Create a result stamped with the current time.
    pub fn new(
        job: &JobDescriptor,
        output_path: Option<PathBuf>,
        elapsed: Duration,
        outcome: JobOutcome,
    ) -> Self {
        Self {
            job_name: job.name().to_string(),
            input_path: job.input_path().to_path_buf(),
            output_path,
            elapsed,
            completed_at: Local::now(),
            outcome,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Captured stdout file, if the job got that far.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn completed_at(&self) -> DateTime<Local> {
        self.completed_at
    }

    pub fn outcome(&self) -> &JobOutcome {
        &self.outcome
    }

    /// Exit code 0 and marker found.
    pub fn success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success)
    }

    /// The process ran to a zero exit code, marker or not.
    pub fn process_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success | JobOutcome::MarkerMissing)
    }

    /// The marker appeared in stdout.
    pub fn marker_found(&self) -> bool {
        match self.outcome {
            JobOutcome::Success => true,
            JobOutcome::ProcessError { marker_found, .. } => marker_found,
            _ => false,
        }
    }

    /// Exit code of the process, if it ran and exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            JobOutcome::Success | JobOutcome::MarkerMissing => Some(0),
            JobOutcome::ProcessError { exit_code, .. } => exit_code,
            _ => None,
        }
    }

    /// Human-readable failure reason. `None` for successful jobs.
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            JobOutcome::Success => None,
            JobOutcome::MarkerMissing => Some("completed without success marker".to_string()),
            JobOutcome::ProcessError {
                exit_code: Some(code),
                ..
            } => Some(format!("exit code {}", code)),
            JobOutcome::ProcessError {
                exit_code: None, ..
            } => Some("terminated by signal".to_string()),
            JobOutcome::ShutdownRequested => Some("Shutdown requested".to_string()),
            JobOutcome::Errored(e) => Some(e.to_string()),
        }
    }
}
