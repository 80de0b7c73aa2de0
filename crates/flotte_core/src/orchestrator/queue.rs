//! Job queue and scheduler.
//!
//! `JobQueue` owns the pending/completed/failed lists. `run_all` drains the
//! pending list into a fixed-size worker pool, one external process per
//! worker at a time, and routes results back in submission order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use chrono::{DateTime, Local};
use rayon::ThreadPoolBuilder;

use super::report::{JobRecord, QueueSummary, RunReport, SummaryKind};
use super::shutdown::{ShutdownCoordinator, ShutdownFlag};
use crate::config::{QueueSettings, Settings};
use crate::jobs::{discover_from_glob, discover_in_directory, DiscoveryError, JobDescriptor};
use crate::runner::{cleanup_job_files, JobOutcome, JobResult, ProcessRunner, RunnerError};

/// Something observable that happened while the queue ran.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A job's result was routed. `index` is its submission position.
    JobFinished {
        index: usize,
        total: usize,
        result: JobResult,
    },
    /// Progress checkpoint, every `progress_interval` jobs.
    Progress { processed: usize, total: usize },
    /// Periodic summary, every `summary_interval` jobs.
    IntermediateSummary(QueueSummary),
    /// The run is over.
    Finished(QueueSummary),
}

/// Callback for queue events. Invoked on the thread that called `run_all`.
pub type QueueEventCallback = Box<dyn Fn(&QueueEvent) + Send + Sync>;

/// Times of the last run, for the report.
#[derive(Debug, Clone, Copy)]
struct RunWindow {
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    workers: usize,
}

/// Scheduler for external calculation jobs.
///
/// # Example
///
/// ```ignore
/// let mut queue = JobQueue::from_settings(&settings);
/// queue.add_jobs_from_directory(Path::new("calcs"), true);
/// let summary = queue.run_all();
/// ```
pub struct JobQueue {
    runner: Arc<ProcessRunner>,
    settings: QueueSettings,
    cleanup_enabled: bool,
    coordinator: ShutdownCoordinator,
    pending: Vec<JobDescriptor>,
    completed: Vec<JobResult>,
    failed: Vec<JobResult>,
    event_callback: Option<QueueEventCallback>,
    last_run: Option<RunWindow>,
}

impl JobQueue {
    /// Create a queue around a runner. Cleanup is enabled.
    pub fn new(runner: ProcessRunner, settings: QueueSettings) -> Self {
        let coordinator =
            ShutdownCoordinator::new(runner.shutdown_flag().clone(), runner.active().clone());
        Self {
            runner: Arc::new(runner),
            settings,
            cleanup_enabled: true,
            coordinator,
            pending: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            event_callback: None,
            last_run: None,
        }
    }

    /// Create a queue from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let runner = ProcessRunner::new(settings.runner.clone())
            .with_output_dir(settings.paths.output_dir.clone());
        Self::new(runner, settings.queue.clone()).with_cleanup(settings.cleanup.enabled)
    }

    /// Enable or disable post-success cleanup.
    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_enabled = enabled;
        self
    }

    /// Receive queue events.
    pub fn with_event_callback(mut self, callback: QueueEventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Coordinator wired to this queue's shutdown flag and active table.
    /// Clones share state.
    pub fn coordinator(&self) -> ShutdownCoordinator {
        self.coordinator.clone()
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        self.runner.shutdown_flag()
    }

    pub fn pending(&self) -> &[JobDescriptor] {
        &self.pending
    }

    pub fn completed(&self) -> &[JobResult] {
        &self.completed
    }

    pub fn failed(&self) -> &[JobResult] {
        &self.failed
    }

    /// Append one input file to the pending list.
    pub fn add_job(&mut self, input_path: impl AsRef<Path>) {
        let job = JobDescriptor::new(input_path.as_ref());
        tracing::info!("Added job: {}", job.name());
        self.pending.push(job);
    }

    /// Discover jobs under `dir` and append them. Returns the number added.
    ///
    /// Discovery errors are logged and add nothing.
    pub fn add_jobs_from_directory(&mut self, dir: &Path, recursive: bool) -> usize {
        match discover_in_directory(dir, recursive, self.runner.settings()) {
            Ok(found) => self.extend_pending(found.jobs),
            Err(e) => {
                log_discovery_error(&e);
                0
            }
        }
    }

    /// Discover jobs matching a glob pattern and append them.
    pub fn add_jobs_from_glob(&mut self, pattern: &str) -> usize {
        match discover_from_glob(pattern, self.runner.settings()) {
            Ok(found) => {
                tracing::info!(
                    "Found {} jobs matching '{}' ({} already complete)",
                    found.len(),
                    pattern,
                    found.skipped.len()
                );
                self.extend_pending(found.jobs)
            }
            Err(e) => {
                log_discovery_error(&e);
                0
            }
        }
    }

    fn extend_pending(&mut self, jobs: Vec<JobDescriptor>) -> usize {
        let added = jobs.len();
        self.pending.extend(jobs);
        added
    }

    /// Current counts. Jobs still pending count as remaining.
    pub fn summary(&self) -> QueueSummary {
        QueueSummary::from_results(&self.completed, &self.failed, self.pending.len())
    }

    /// Run every pending job and wait for all of them.
    ///
    /// Each job is accounted for exactly once, in submission order. Jobs
    /// that had not started when shutdown was requested come back as
    /// `ShutdownRequested`.
    pub fn run_all(&mut self) -> QueueSummary {
        let jobs = std::mem::take(&mut self.pending);
        let total = jobs.len();
        let started_at = Local::now();
        let workers = self.settings.effective_workers();

        if total == 0 {
            tracing::warn!("No jobs to run");
            return self.finish(started_at, workers);
        }

        tracing::info!("Starting {} jobs with {} workers", total, workers);

        let (tx, rx) = mpsc::channel::<(usize, JobResult)>();
        // Kept so a job whose worker died can still be accounted for.
        let submitted = jobs.clone();

        // The pool must outlive the receive loop, or queued jobs are dropped.
        let _pool = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("flotte-worker-{}", i))
            .panic_handler(|_| tracing::error!("A worker panicked while running a job"))
            .build()
        {
            Ok(pool) => {
                for (index, job) in jobs.into_iter().enumerate() {
                    let runner = Arc::clone(&self.runner);
                    let tx = tx.clone();
                    pool.spawn_fifo(move || {
                        let result = runner.run(&job);
                        let _ = tx.send((index, result));
                    });
                }
                Some(pool)
            }
            Err(e) => {
                tracing::error!("Failed to build worker pool ({}), running jobs one at a time", e);
                let runner = Arc::clone(&self.runner);
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for (index, job) in jobs.into_iter().enumerate() {
                        let result = runner.run(&job);
                        let _ = tx.send((index, result));
                    }
                });
                None
            }
        };
        drop(tx);

        let mut buffer: BTreeMap<usize, JobResult> = BTreeMap::new();
        let mut next = 0;
        for (index, result) in rx {
            buffer.insert(index, result);
            while let Some(result) = buffer.remove(&next) {
                self.route(next, total, result);
                next += 1;
            }
        }

        // Every sender is gone. Anything still missing never reported back.
        while next < total {
            let result = buffer.remove(&next).unwrap_or_else(|| {
                JobResult::new(
                    &submitted[next],
                    None,
                    std::time::Duration::ZERO,
                    JobOutcome::Errored(RunnerError::Io {
                        operation: "running job".to_string(),
                        message: "worker stopped without a result".to_string(),
                    }),
                )
            });
            self.route(next, total, result);
            next += 1;
        }

        self.finish(started_at, workers)
    }

    /// Record one result, clean up after success, and emit cadence events.
    fn route(&mut self, index: usize, total: usize, result: JobResult) {
        if result.success() {
            if self.cleanup_enabled {
                let retained = self.runner.retained_extensions();
                if let Err(e) = cleanup_job_files(&result, &retained) {
                    tracing::error!("Error cleaning up files for {}: {}", result.job_name(), e);
                }
            }
            self.completed.push(result.clone());
        } else {
            self.failed.push(result.clone());
        }

        self.emit(&QueueEvent::JobFinished {
            index,
            total,
            result,
        });

        let processed = self.completed.len() + self.failed.len();
        if is_checkpoint(processed, self.settings.progress_interval) {
            tracing::info!(
                "Progress: {}/{} jobs processed ({:.1}%)",
                processed,
                total,
                processed as f64 / total as f64 * 100.0
            );
            self.emit(&QueueEvent::Progress { processed, total });
        }
        if is_checkpoint(processed, self.settings.summary_interval) {
            let remaining = total - processed;
            let summary = QueueSummary::from_results(&self.completed, &self.failed, remaining);
            summary.log(SummaryKind::Intermediate);
            self.emit(&QueueEvent::IntermediateSummary(summary));
        }
    }

    fn finish(&mut self, started_at: DateTime<Local>, workers: usize) -> QueueSummary {
        self.last_run = Some(RunWindow {
            started_at,
            finished_at: Local::now(),
            workers,
        });
        let summary = self.summary();
        summary.log(SummaryKind::Final);
        self.emit(&QueueEvent::Finished(summary.clone()));
        summary
    }

    fn emit(&self, event: &QueueEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// Machine-readable record of everything this queue has run.
    pub fn report(&self) -> RunReport {
        let now = Local::now();
        let window = self.last_run.unwrap_or(RunWindow {
            started_at: now,
            finished_at: now,
            workers: self.settings.effective_workers(),
        });
        RunReport {
            started_at: window.started_at,
            finished_at: window.finished_at,
            executable: self.runner.settings().executable.clone(),
            workers: window.workers,
            shutdown_requested: self.shutdown_flag().is_requested(),
            summary: self.summary(),
            jobs: self
                .completed
                .iter()
                .chain(self.failed.iter())
                .map(JobRecord::from)
                .collect(),
        }
    }
}

fn is_checkpoint(processed: usize, interval: usize) -> bool {
    interval > 0 && processed % interval == 0
}

fn log_discovery_error(error: &DiscoveryError) {
    match error {
        DiscoveryError::DirectoryNotFound(dir) => {
            tracing::error!("Directory {} does not exist", dir.display())
        }
        other => tracing::error!("{}", other),
    }
}
