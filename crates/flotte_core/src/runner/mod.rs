//! Process runner: one external calculation per job.
//!
//! This module provides:
//! - `ProcessRunner`: spawns the program, captures output, classifies
//! - `ActiveProcesses`: shared table of in-flight children
//! - `JobResult` / `JobOutcome`: what happened to a job
//! - `cleanup_job_files`: post-success scratch removal

mod active;
mod cleanup;
mod process;
mod result;

pub use active::{ActiveGuard, ActiveProcesses, ChildHandle};
pub use cleanup::{cleanup_job_files, CleanupError, CleanupReport};
pub use process::ProcessRunner;
pub use result::{JobOutcome, JobResult, RunnerError};
