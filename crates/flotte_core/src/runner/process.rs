//! Runs one external calculation per job.
//!
//! The external program is started from the input file's directory with the
//! input file name as its only argument. Its stdout is saved as
//! `<job>.out` and judged by exit code plus a marker token.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::active::{kill_process_tree, ActiveGuard, ActiveProcesses, ChildHandle};
use super::result::{JobOutcome, JobResult, RunnerError};
use crate::config::RunnerSettings;
use crate::jobs::JobDescriptor;
use crate::orchestrator::ShutdownFlag;

/// Captured output of a finished process.
struct Captured {
    status: ExitStatus,
    stdout: String,
}

/// Executes jobs with the configured external program.
///
/// Cheap to share: workers hold it behind an `Arc` and call [`run`] from
/// their own threads.
///
/// [`run`]: ProcessRunner::run
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    settings: RunnerSettings,
    output_dir: Option<PathBuf>,
    active: ActiveProcesses,
    shutdown: ShutdownFlag,
}

impl ProcessRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self {
            settings,
            output_dir: None,
            active: ActiveProcesses::new(),
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Write outputs here instead of next to each input file.
    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Share an existing shutdown flag.
    pub fn with_shutdown_flag(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn active(&self) -> &ActiveProcesses {
        &self.active
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Extensions that survive post-success cleanup: output, input, result.
    pub fn retained_extensions(&self) -> [&str; 3] {
        [
            self.settings.output_extension.as_str(),
            self.settings.input_extension.as_str(),
            self.settings.result_extension.as_str(),
        ]
    }

    /// Where the captured stdout of `job` goes.
    pub fn output_path_for(&self, job: &JobDescriptor) -> PathBuf {
        let dir = self
            .output_dir
            .as_deref()
            .unwrap_or_else(|| job.input_dir());
        dir.join(format!("{}.{}", job.name(), self.settings.output_extension))
    }

    /// Run one job to completion.
    ///
    /// Never fails: every error is folded into the returned result.
    pub fn run(&self, job: &JobDescriptor) -> JobResult {
        let started = Instant::now();

        if self.shutdown.is_requested() {
            tracing::debug!("Skipping job {}: shutdown requested", job.name());
            return JobResult::new(job, None, started.elapsed(), JobOutcome::ShutdownRequested);
        }

        let output_path = self.output_path_for(job);

        match self.execute(job, &output_path) {
            Ok(captured) => {
                let elapsed = started.elapsed();
                let marker_found = captured.stdout.contains(&self.settings.success_marker);
                let outcome = JobOutcome::classify(captured.status.code(), marker_found);

                let status = match &outcome {
                    JobOutcome::Success => format!(
                        "completed successfully ({} found)",
                        self.settings.success_marker
                    ),
                    JobOutcome::MarkerMissing => {
                        format!("completed but without {}", self.settings.success_marker)
                    }
                    _ => match captured.status.code() {
                        Some(code) => format!("failed with return code {}", code),
                        None => "was terminated by a signal".to_string(),
                    },
                };
                tracing::info!(
                    "Job {} {} in {:.2} seconds",
                    job.name(),
                    status,
                    elapsed.as_secs_f64()
                );

                JobResult::new(job, Some(output_path), elapsed, outcome)
            }
            Err(e) => {
                tracing::error!("Error in job {}: {}", job.name(), e);
                JobResult::new(job, None, started.elapsed(), JobOutcome::Errored(e))
            }
        }
    }

    /// Spawn, wait, and persist output. The active-table entry lives exactly
    /// as long as the process is being waited on.
    fn execute(&self, job: &JobDescriptor, output_path: &Path) -> Result<Captured, RunnerError> {
        let executable = fs::canonicalize(&self.settings.executable)
            .map_err(|_| RunnerError::ExecutableNotFound(self.settings.executable.clone()))?;

        if let Some(dir) = output_path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| RunnerError::io(format!("creating {}", dir.display()), e))?;
        }

        let mut cmd = Command::new(&executable);
        cmd.arg(job.input_file_name())
            .current_dir(job.input_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = search_path_with(executable.parent()) {
            cmd.env("PATH", path);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a terminate also reaches helpers the program starts.
            cmd.process_group(0);
        }

        tracing::debug!("Running job {}: {:?}", job.name(), cmd);

        let mut child = cmd.spawn().map_err(|e| RunnerError::SpawnFailed {
            executable: executable.clone(),
            message: e.to_string(),
        })?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let handle = Arc::new(Mutex::new(child));
        let status = {
            let _guard = self.track(job.name(), &handle);
            wait_for(&handle, Duration::from_millis(self.settings.poll_interval_ms))
        };
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                let _ = kill_process_tree(&mut handle.lock());
                return Err(RunnerError::io("waiting for process", e));
            }
        };

        let stdout = join_reader(stdout_reader, "stdout")?;
        let stderr = join_reader(stderr_reader, "stderr")?;

        fs::write(output_path, &stdout)
            .map_err(|e| RunnerError::io(format!("writing {}", output_path.display()), e))?;

        if !stderr.is_empty() {
            let mut err_path = output_path.as_os_str().to_owned();
            err_path.push(".");
            err_path.push(&self.settings.stderr_suffix);
            let err_path = PathBuf::from(err_path);
            fs::write(&err_path, &stderr)
                .map_err(|e| RunnerError::io(format!("writing {}", err_path.display()), e))?;
        }

        Ok(Captured { status, stdout })
    }
}

impl ProcessRunner {
    /// Register a freshly spawned child. If shutdown was requested before the
    /// entry became visible, the child is killed here.
    fn track(&self, name: &str, handle: &ChildHandle) -> ActiveGuard {
        let guard = self.active.register(name, Arc::clone(handle));
        if self.shutdown.is_requested() {
            tracing::info!("Terminating process for job {}: shutdown requested", name);
            if let Err(e) = kill_process_tree(&mut handle.lock()) {
                tracing::debug!("Terminate failed for job {}: {}", name, e);
            }
        }
        guard
    }
}

/// PATH with `dir` in front, so helper programs next to the executable
/// resolve first.
fn search_path_with(dir: Option<&Path>) -> Option<OsString> {
    let dir = dir?;
    let current = env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(dir.to_path_buf()).chain(env::split_paths(&current));
    env::join_paths(paths).ok()
}

/// Read a pipe to the end on a helper thread so the child never blocks on a
/// full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<String>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }))
}

fn join_reader(
    reader: Option<JoinHandle<std::io::Result<String>>>,
    stream: &str,
) -> Result<String, RunnerError> {
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    match reader.join() {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(RunnerError::io(format!("reading {}", stream), e)),
        Err(_) => Err(RunnerError::Io {
            operation: format!("reading {}", stream),
            message: "reader thread panicked".to_string(),
        }),
    }
}

/// Poll until the child exits. The lock is only held for each `try_wait`,
/// leaving room for a concurrent kill.
fn wait_for(child: &Mutex<Child>, poll: Duration) -> std::io::Result<ExitStatus> {
    loop {
        if let Some(status) = child.lock().try_wait()? {
            return Ok(status);
        }
        thread::sleep(poll);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{fake_program, runner_settings, write_input};
    use std::os::unix::process::CommandExt;
    use tempfile::tempdir;

    #[test]
    fn marker_and_exit_zero_is_success() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo 'xtb run'\necho '  ... HURRAY ...'\nexit 0");
        let input = write_input(&dir.path().join("calc"), "fe_1");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(result.success(), "{:?}", result.outcome());
        assert!(result.process_success());
        assert!(result.marker_found());
        assert_eq!(result.exit_code(), Some(0));

        let out = fs::read_to_string(result.output_path().unwrap()).unwrap();
        assert!(out.contains("HURRAY"));
        assert!(!dir.path().join("calc").join("fe_1.out.err").exists());
    }

    #[test]
    fn exit_one_is_process_error() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo 'SCF NOT CONVERGED'\nexit 1");
        let input = write_input(dir.path(), "co_2");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(!result.success());
        assert!(!result.process_success());
        assert!(!result.marker_found());
        assert_eq!(result.exit_code(), Some(1));
    }

    #[test]
    fn exit_zero_without_marker_is_not_verified() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo 'finished'\nexit 0");
        let input = write_input(dir.path(), "ni_3");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        assert_eq!(result.outcome(), &JobOutcome::MarkerMissing);
    }

    #[test]
    fn marker_with_nonzero_exit_is_still_failure() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo HURRAY\nexit 3");
        let input = write_input(dir.path(), "mn_4");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(!result.success());
        assert!(result.marker_found());
        assert_eq!(result.exit_code(), Some(3));
    }

    #[test]
    fn stderr_goes_to_sibling_file() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo HURRAY\necho 'warning: tight memory' >&2");
        let input = write_input(dir.path(), "ag_5");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(result.success());
        let err = fs::read_to_string(dir.path().join("ag_5.out.err")).unwrap();
        assert!(err.contains("tight memory"));
    }

    #[test]
    fn runs_in_input_directory_with_file_name_argument() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "pwd -P\necho \"arg=$1\"\necho HURRAY");
        let calc = dir.path().join("Linear").join("Cu");
        let input = write_input(&calc, "cu_6");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        let out = fs::read_to_string(result.output_path().unwrap()).unwrap();
        assert!(out.contains("arg=cu_6.inp"));
        let cwd = fs::canonicalize(&calc).unwrap();
        assert!(out.contains(&cwd.display().to_string()));
    }

    #[test]
    fn executable_dir_is_prefixed_onto_path() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo \"PATH=$PATH\"\necho HURRAY");
        let input = write_input(dir.path(), "zn_7");
        let runner = ProcessRunner::new(runner_settings(&exe));

        let result = runner.run(&JobDescriptor::new(&input));

        let out = fs::read_to_string(result.output_path().unwrap()).unwrap();
        let exe_dir = fs::canonicalize(dir.path()).unwrap();
        assert!(out.contains(&format!("PATH={}", exe_dir.display())));
    }

    #[test]
    fn output_dir_override() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo HURRAY");
        let input = write_input(&dir.path().join("in"), "ti_8");
        let out_dir = dir.path().join("done");
        let runner =
            ProcessRunner::new(runner_settings(&exe)).with_output_dir(Some(out_dir.clone()));

        let result = runner.run(&JobDescriptor::new(&input));

        assert_eq!(result.output_path(), Some(out_dir.join("ti_8.out").as_path()));
        assert!(out_dir.join("ti_8.out").exists());
    }

    #[test]
    fn missing_executable_spawns_nothing() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "v_9");
        let runner = ProcessRunner::new(runner_settings(&dir.path().join("no_orca")));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(matches!(
            result.outcome(),
            JobOutcome::Errored(RunnerError::ExecutableNotFound(_))
        ));
        assert!(!dir.path().join("v_9.out").exists());
        assert!(runner.active().is_empty());
    }

    #[test]
    fn shutdown_flag_skips_spawn() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("spawned");
        let exe = fake_program(dir.path(), &format!("touch '{}'\necho HURRAY", marker.display()));
        let input = write_input(dir.path(), "cr_10");
        let runner = ProcessRunner::new(runner_settings(&exe));
        runner.shutdown_flag().request();

        let result = runner.run(&JobDescriptor::new(&input));

        assert_eq!(result.outcome(), &JobOutcome::ShutdownRequested);
        assert!(!marker.exists());
        assert!(!dir.path().join("cr_10.out").exists());
    }

    #[test]
    fn active_entry_removed_after_run() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "sleep 0.2\necho HURRAY");
        let inputs: Vec<PathBuf> = (0..6)
            .map(|i| write_input(dir.path(), &format!("job_{}", i)))
            .collect();
        let runner = Arc::new(ProcessRunner::new(runner_settings(&exe)));

        let seen_active = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let runner = Arc::clone(&runner);
                thread::spawn(move || {
                    let job = JobDescriptor::new(input);
                    let result = runner.run(&job);
                    assert!(!runner.active().contains(job.name()));
                    result
                })
            })
            .collect();

        let watcher = {
            let runner = Arc::clone(&runner);
            let seen = Arc::clone(&seen_active);
            thread::spawn(move || {
                for _ in 0..50 {
                    if !runner.active().is_empty() {
                        seen.store(true, std::sync::atomic::Ordering::SeqCst);
                        break;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };

        for handle in handles {
            assert!(handle.join().unwrap().success());
        }
        watcher.join().unwrap();

        assert!(runner.active().is_empty());
        assert!(seen_active.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn terminate_does_not_wait_for_helper_processes() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo started\nsleep 30\necho HURRAY");
        let input = write_input(dir.path(), "helper");
        let runner = Arc::new(ProcessRunner::new(runner_settings(&exe)));

        let worker = {
            let runner = Arc::clone(&runner);
            thread::spawn(move || runner.run(&JobDescriptor::new(input)))
        };

        for _ in 0..200 {
            if runner.active().contains("helper") {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(runner.active().terminate_all(), 1);
        let killed_at = Instant::now();

        let result = worker.join().unwrap();
        assert!(killed_at.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            result.outcome(),
            JobOutcome::ProcessError { exit_code: None, .. }
        ));
        let out = fs::read_to_string(result.output_path().unwrap()).unwrap();
        assert!(!out.contains("HURRAY"));
    }

    #[test]
    fn shutdown_after_spawn_kills_untracked_child() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "exec sleep 30");
        let runner = ProcessRunner::new(runner_settings(&exe));
        let child = Command::new(&exe)
            .stdout(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap();
        let handle: ChildHandle = Arc::new(Mutex::new(child));

        runner.shutdown_flag().request();
        let guard = runner.track("late", &handle);
        assert!(runner.active().contains("late"));

        let status = wait_for(&handle, Duration::from_millis(10)).unwrap();
        assert_eq!(status.code(), None);
        drop(guard);
        assert!(runner.active().is_empty());
    }

    #[test]
    fn failure_after_spawn_clears_active_entry() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let exe = fake_program(dir.path(), &format!("touch '{}'\necho HURRAY", marker.display()));
        let input = write_input(&dir.path().join("in"), "sc_11");
        let out_dir = dir.path().join("out");
        // A directory where the output file belongs makes the final write fail.
        fs::create_dir_all(out_dir.join("sc_11.out")).unwrap();
        let runner = ProcessRunner::new(runner_settings(&exe)).with_output_dir(Some(out_dir));

        let result = runner.run(&JobDescriptor::new(&input));

        assert!(marker.exists());
        assert!(matches!(
            result.outcome(),
            JobOutcome::Errored(RunnerError::Io { .. })
        ));
        assert!(runner.active().is_empty());
    }

    #[test]
    fn killed_process_is_reported_without_exit_code() {
        let dir = tempdir().unwrap();
        let exe = fake_program(dir.path(), "echo started\nexec sleep 30");
        let input = write_input(dir.path(), "hung");
        let runner = Arc::new(ProcessRunner::new(runner_settings(&exe)));

        let worker = {
            let runner = Arc::clone(&runner);
            thread::spawn(move || runner.run(&JobDescriptor::new(input)))
        };

        for _ in 0..200 {
            if runner.active().contains("hung") {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(runner.active().terminate_all(), 1);

        let result = worker.join().unwrap();
        assert!(matches!(
            result.outcome(),
            JobOutcome::ProcessError { exit_code: None, .. }
        ));
        assert!(runner.active().is_empty());
    }
}
