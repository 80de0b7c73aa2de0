use crate::cli::RunArgs;
use crate::config::apply_run_overrides;
use crate::error::{CliError, Result};
use crate::signals;
use flotte_core::config::Settings;
use flotte_core::orchestrator::JobQueue;
use std::path::PathBuf;
use tracing::{info, warn};

pub async fn run(args: RunArgs, mut settings: Settings) -> Result<()> {
    apply_run_overrides(&mut settings, &args);

    // Each job records its own spawn failure, so a bad path is not fatal here.
    if !args.dry_run && !settings.runner.executable.exists() {
        warn!(
            "ORCA executable not found at: {}",
            settings.runner.executable.display()
        );
    }

    let mut queue = JobQueue::from_settings(&settings);
    let recursive = !args.no_recursive;

    let (input_dir, pattern) = job_sources(&args, &settings);
    if let Some(ref dir) = input_dir {
        queue.add_jobs_from_directory(dir, recursive);
    }
    if let Some(ref pattern) = pattern {
        queue.add_jobs_from_glob(pattern);
    }

    let job_count = queue.pending().len();
    if job_count == 0 {
        warn!("No jobs found to process");
        return Ok(());
    }

    if args.dry_run {
        for job in queue.pending() {
            println!("{}", job.input_path().display());
        }
        println!("{} job(s) would be submitted.", job_count);
        return Ok(());
    }

    info!(
        "Executable: {} | workers: {}",
        settings.runner.executable.display(),
        settings.queue.effective_workers()
    );

    let signal_task = tokio::spawn(signals::watch(queue.coordinator()));

    let (queue, summary) = tokio::task::spawn_blocking(move || {
        let summary = queue.run_all();
        (queue, summary)
    })
    .await
    .map_err(|e| CliError::Other(anyhow::anyhow!("Queue task failed: {}", e)))?;

    signal_task.abort();

    if let Some(ref path) = settings.paths.report_file {
        queue.report().write_json(path)?;
    }

    if queue.shutdown_flag().is_requested() {
        println!(
            "Stopped early: {} succeeded, {} failed, out of {} jobs.",
            summary.successful,
            summary.failed(),
            job_count
        );
    } else {
        println!(
            "Finished {} jobs: {} succeeded, {} without marker, {} failed.",
            summary.processed(),
            summary.successful,
            summary.marker_missing,
            summary.process_errors
        );
    }

    Ok(())
}

/// Where to look for jobs. A `--pattern` without `--input-dir` replaces the
/// configured directory; with neither, the working directory is scanned.
fn job_sources(args: &RunArgs, settings: &Settings) -> (Option<PathBuf>, Option<String>) {
    let pattern = args.pattern.clone();
    let input_dir = match (&args.input_dir, &pattern) {
        (Some(dir), _) => Some(dir.clone()),
        (None, Some(_)) => None,
        (None, None) => Some(
            settings
                .paths
                .input_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        ),
    };
    (input_dir, pattern)
}
