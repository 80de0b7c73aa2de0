//! Queue summaries and the JSON run report.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::runner::{JobOutcome, JobResult};

/// Which summary is being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// Periodic counts while the queue is still running.
    Intermediate,
    /// End-of-run counts plus the list of anomalous jobs.
    Final,
}

/// A job that did not succeed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub job_name: String,
    pub reason: String,
}

/// Snapshot of queue counts. Building one never mutates the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// Jobs that exited 0 with the marker.
    pub successful: usize,
    /// Jobs that exited 0 without the marker.
    pub marker_missing: usize,
    /// Every other failure: non-zero exit, signal, runner error, skipped.
    pub process_errors: usize,
    /// Jobs not yet accounted for.
    pub pending: usize,
    /// Failed jobs in the order they were recorded.
    pub anomalies: Vec<Anomaly>,
}

impl QueueSummary {
    /// Build a summary from the completed and failed lists.
    pub fn from_results(completed: &[JobResult], failed: &[JobResult], pending: usize) -> Self {
        let marker_missing = failed
            .iter()
            .filter(|r| matches!(r.outcome(), JobOutcome::MarkerMissing))
            .count();

        let anomalies = failed
            .iter()
            .map(|r| Anomaly {
                job_name: r.job_name().to_string(),
                reason: r
                    .error_message()
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        Self {
            successful: completed.len(),
            marker_missing,
            process_errors: failed.len() - marker_missing,
            pending,
            anomalies,
        }
    }

    /// Jobs accounted for so far.
    pub fn processed(&self) -> usize {
        self.successful + self.marker_missing + self.process_errors
    }

    /// Processed plus pending.
    pub fn total(&self) -> usize {
        self.processed() + self.pending
    }

    /// Number of failed jobs of any kind.
    pub fn failed(&self) -> usize {
        self.marker_missing + self.process_errors
    }

    /// Log the summary at info level.
    pub fn log(&self, kind: SummaryKind) {
        let title = match kind {
            SummaryKind::Intermediate => "INTERMEDIATE SUMMARY",
            SummaryKind::Final => "FINAL SUMMARY",
        };

        tracing::info!("{}", "=".repeat(50));
        tracing::info!("{}", title);
        tracing::info!("{}", "=".repeat(50));
        tracing::info!("Successfully completed (marker found): {}", self.successful);
        tracing::info!("Completed but not verified (no marker): {}", self.marker_missing);
        tracing::info!("Failed with errors: {}", self.process_errors);
        tracing::info!("Remaining in queue: {}", self.pending);

        if kind == SummaryKind::Final && !self.anomalies.is_empty() {
            tracing::info!("");
            tracing::info!("Jobs needing attention:");
            for anomaly in &self.anomalies {
                tracing::info!("  {}: {}", anomaly.job_name, anomaly.reason);
            }
        }
        tracing::info!("{}", "=".repeat(50));
    }
}

/// Errors writing the run report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write run report to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One job's line in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_name: String,
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub outcome: &'static str,
    pub exit_code: Option<i32>,
    pub marker_found: bool,
    pub elapsed_secs: f64,
    pub completed_at: DateTime<Local>,
    pub error: Option<String>,
}

impl From<&JobResult> for JobRecord {
    fn from(result: &JobResult) -> Self {
        Self {
            job_name: result.job_name().to_string(),
            input_path: result.input_path().to_path_buf(),
            output_path: result.output_path().map(Path::to_path_buf),
            outcome: result.outcome().label(),
            exit_code: result.exit_code(),
            marker_found: result.marker_found(),
            elapsed_secs: result.elapsed().as_secs_f64(),
            completed_at: result.completed_at(),
            error: result.error_message(),
        }
    }
}

/// Machine-readable record of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub executable: PathBuf,
    pub workers: usize,
    pub shutdown_requested: bool,
    pub summary: QueueSummary,
    pub jobs: Vec<JobRecord>,
}

impl RunReport {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `path`, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        let write_err = |source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, json).map_err(write_err)?;
        tracing::info!("Run report written to {}", path.display());
        Ok(())
    }
}
