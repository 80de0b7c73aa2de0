//! Scratch-file cleanup after a successful job.
//!
//! The external program leaves scratch files next to its input (wave
//! functions, densities, temporary geometries). Once a job is verified, any
//! file in the input directory that starts with the job name and does not
//! end in a retained extension is deleted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::result::JobResult;

/// Failure while deleting scratch files. Never changes a job's outcome.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Failed to list {}: {source}", .dir.display())]
    ListFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read an entry of {}: {source}", .dir.display())]
    EntryFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete {}: {source}", .path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a cleanup pass did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files removed.
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed.
    pub errors: Vec<CleanupError>,
}

/// Delete the job's non-retained files from its input directory.
///
/// `retained` holds extensions without the dot. Files are matched by name
/// prefix, so `mol1` also matches `mol1.gbw` and `mol1_trj.xyz`.
pub fn cleanup_job_files(
    result: &JobResult,
    retained: &[&str],
) -> Result<CleanupReport, CleanupError> {
    let dir = result
        .input_path()
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = result.job_name();

    let entries = fs::read_dir(&dir).map_err(|source| CleanupError::ListFailed {
        dir: dir.clone(),
        source,
    })?;

    let report = sweep(&dir, entries.map(|e| e.map(|e| e.path())), prefix, retained);

    if !report.deleted.is_empty() {
        let names: Vec<String> = report
            .deleted
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        tracing::info!(
            "Cleaned up {} files for job {}: {}",
            names.len(),
            prefix,
            names.join(", ")
        );
    }
    for err in &report.errors {
        tracing::error!("Error cleaning up files for {}: {}", prefix, err);
    }

    Ok(report)
}

/// Delete matching files among `entries`, collecting every failure.
fn sweep<I>(dir: &Path, entries: I, prefix: &str, retained: &[&str]) -> CleanupReport
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut report = CleanupReport::default();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(source) => {
                report.errors.push(CleanupError::EntryFailed {
                    dir: dir.to_path_buf(),
                    source,
                });
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.starts_with(prefix) || is_retained(&name, retained) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => report.deleted.push(path),
            Err(source) => report.errors.push(CleanupError::DeleteFailed { path, source }),
        }
    }
    report.deleted.sort();
    report
}

fn is_retained(name: &str, retained: &[&str]) -> bool {
    retained
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobDescriptor;
    use crate::runner::JobOutcome;
    use std::time::Duration;
    use tempfile::tempdir;

    const RETAINED: [&str; 3] = ["out", "inp", "xyz"];

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "x").unwrap();
    }

    fn success_for(input: PathBuf) -> JobResult {
        JobResult::new(
            &JobDescriptor::new(input),
            None,
            Duration::from_secs(1),
            JobOutcome::Success,
        )
    }

    #[test]
    fn removes_only_non_retained_prefixed_files() {
        let dir = tempdir().unwrap();
        for name in [
            "pd_2.inp",
            "pd_2.out",
            "pd_2.xyz",
            "pd_2.gbw",
            "pd_2.densities",
            "pd_2_trj.tmp",
            "pd_2.out.err",
            "other.gbw",
        ] {
            touch(dir.path(), name);
        }

        let job = success_for(dir.path().join("pd_2.inp"));
        let report = cleanup_job_files(&job, &RETAINED).unwrap();

        assert_eq!(report.deleted.len(), 4);
        assert!(report.errors.is_empty());

        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["other.gbw", "pd_2.inp", "pd_2.out", "pd_2.xyz"]);

        for name in remaining.iter().filter(|n| n.starts_with("pd_2")) {
            assert!(is_retained(name, &RETAINED));
        }
    }

    #[test]
    fn directories_are_left_alone() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "rh_1.inp");
        fs::create_dir(dir.path().join("rh_1_scratch")).unwrap();

        let job = success_for(dir.path().join("rh_1.inp"));
        let report = cleanup_job_files(&job, &RETAINED).unwrap();

        assert!(report.deleted.is_empty());
        assert!(dir.path().join("rh_1_scratch").is_dir());
    }

    #[test]
    fn unreadable_entries_are_reported_not_dropped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "os_3.gbw");
        let entries = vec![
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "entry vanished")),
            Ok(dir.path().join("os_3.gbw")),
        ];

        let report = sweep(dir.path(), entries, "os_3", &RETAINED);

        assert_eq!(report.deleted, vec![dir.path().join("os_3.gbw")]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], CleanupError::EntryFailed { .. }));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone").join("w_1.inp");
        let result = cleanup_job_files(&success_for(gone), &RETAINED);
        assert!(matches!(result, Err(CleanupError::ListFailed { .. })));
    }
}
