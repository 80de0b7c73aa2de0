//! Job discovery from input directories and glob patterns.
//!
//! Discovery is what makes re-submission idempotent: an input file whose
//! result geometry (`<stem>.xyz` by default) already sits next to it is
//! skipped, so re-running against a partially finished tree only queues
//! the unfinished work.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::JobDescriptor;
use crate::config::RunnerSettings;

/// Errors raised while enumerating input files.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Input directory does not exist or is not a directory.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Glob pattern could not be parsed.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Jobs still to run, in path order.
    pub jobs: Vec<JobDescriptor>,
    /// Input files skipped because their result already exists.
    pub skipped: Vec<PathBuf>,
}

impl Discovered {
    /// Number of jobs found.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when nothing is left to run.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Find input files under `dir`.
///
/// With `recursive` every sub-directory is searched, otherwise only the
/// top level. Files whose result geometry already exists are skipped.
pub fn discover_in_directory(
    dir: &Path,
    recursive: bool,
    runner: &RunnerSettings,
) -> DiscoveryResult<Discovered> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }
    let base = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

    let escaped = glob::Pattern::escape(&base.to_string_lossy());
    let pattern = if recursive {
        format!("{}/**/*.{}", escaped, runner.input_extension)
    } else {
        format!("{}/*.{}", escaped, runner.input_extension)
    };

    let found = discover_from_glob(&pattern, runner)?;

    tracing::info!(
        "Found {} jobs in '{}' (recursive={}, {} already complete)",
        found.jobs.len(),
        base.display(),
        recursive,
        found.skipped.len()
    );

    Ok(found)
}

/// Find input files matching a glob pattern (`**` is supported).
pub fn discover_from_glob(pattern: &str, runner: &RunnerSettings) -> DiscoveryResult<Discovered> {
    let paths = glob::glob(pattern).map_err(|e| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut candidates = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => candidates.push(absolute(path)),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
        }
    }
    candidates.sort();

    let mut found = Discovered::default();
    for input in candidates {
        let job = JobDescriptor::new(input);
        let result = job.sibling(&runner.result_extension);
        if result.is_file() {
            tracing::info!(
                "Skipping job {}: {} already exists",
                job.name(),
                result.display()
            );
            found.skipped.push(job.input_path().to_path_buf());
        } else {
            found.jobs.push(job);
        }
    }

    Ok(found)
}

fn absolute(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path)
        .or_else(|_| std::path::absolute(&path))
        .unwrap_or(path)
}
