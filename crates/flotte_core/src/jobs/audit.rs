//! Audit of finished output files.
//!
//! Scans `.out` files and reports which ones carry every required marker,
//! e.g. before handing a finished batch to the next pipeline stage.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::discovery::{DiscoveryError, DiscoveryResult};
use crate::config::{AuditSettings, RunnerSettings};

/// Verdict for one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Every required marker is present.
    Verified,
    /// At least one required marker is missing.
    Unverified,
    /// The file could not be read.
    Unreadable,
}

/// Audit record for one output file.
#[derive(Debug, Clone, Serialize)]
pub struct OutputAudit {
    /// Path to the output file.
    pub output_path: PathBuf,
    /// Classification.
    pub status: AuditStatus,
    /// Markers that were not found.
    pub missing_markers: Vec<String>,
    /// Whether the result geometry sits next to the output.
    pub has_result: bool,
}

/// Counts over a set of audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditCounts {
    pub verified: usize,
    pub unverified: usize,
    pub unreadable: usize,
}

impl AuditCounts {
    /// Tally a slice of records.
    pub fn tally(records: &[OutputAudit]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.status {
                AuditStatus::Verified => acc.verified += 1,
                AuditStatus::Unverified => acc.unverified += 1,
                AuditStatus::Unreadable => acc.unreadable += 1,
            }
            acc
        })
    }
}

/// Audit every output file under `dir`.
pub fn audit_outputs(
    dir: &Path,
    recursive: bool,
    runner: &RunnerSettings,
    audit: &AuditSettings,
) -> DiscoveryResult<Vec<OutputAudit>> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = if recursive {
        format!("{}/**/*.{}", escaped, runner.output_extension)
    } else {
        format!("{}/*.{}", escaped, runner.output_extension)
    };

    let paths = glob::glob(&pattern).map_err(|e| DiscoveryError::InvalidPattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;

    let mut records: Vec<OutputAudit> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| audit_file(p, runner, audit))
        .collect();
    records.sort_by(|a, b| a.output_path.cmp(&b.output_path));

    let counts = AuditCounts::tally(&records);
    tracing::info!(
        "Audited {} outputs in '{}': {} verified, {} unverified, {} unreadable",
        records.len(),
        dir.display(),
        counts.verified,
        counts.unverified,
        counts.unreadable
    );

    Ok(records)
}

/// Check a single output file against the required markers.
pub fn audit_file(
    output_path: PathBuf,
    runner: &RunnerSettings,
    audit: &AuditSettings,
) -> OutputAudit {
    let has_result = output_path
        .with_extension(&runner.result_extension)
        .is_file();

    match fs::read(&output_path) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            let missing_markers: Vec<String> = audit
                .required_markers
                .iter()
                .filter(|m| !content.contains(m.as_str()))
                .cloned()
                .collect();
            let status = if missing_markers.is_empty() {
                AuditStatus::Verified
            } else {
                AuditStatus::Unverified
            };
            OutputAudit {
                output_path,
                status,
                missing_markers,
                has_result,
            }
        }
        Err(e) => {
            tracing::warn!("Could not read {}: {}", output_path.display(), e);
            OutputAudit {
                output_path,
                status: AuditStatus::Unreadable,
                missing_markers: audit.required_markers.clone(),
                has_result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn classifies_outputs_by_markers() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("good.out"),
            "...\n HURRAY \n****ORCA TERMINATED NORMALLY****\n",
        )
        .unwrap();
        fs::write(dir.path().join("good.xyz"), "3\n\n").unwrap();
        fs::write(dir.path().join("partial.out"), "HURRAY but then crashed\n").unwrap();

        let records = audit_outputs(
            dir.path(),
            false,
            &RunnerSettings::default(),
            &AuditSettings::default(),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        let good = &records[0];
        assert_eq!(good.status, AuditStatus::Verified);
        assert!(good.has_result);

        let partial = &records[1];
        assert_eq!(partial.status, AuditStatus::Unverified);
        assert_eq!(partial.missing_markers, vec!["ORCA TERMINATED NORMALLY".to_string()]);
        assert!(!partial.has_result);

        let counts = AuditCounts::tally(&records);
        assert_eq!(counts.verified, 1);
        assert_eq!(counts.unverified, 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let result = audit_outputs(
            &dir.path().join("gone"),
            true,
            &RunnerSettings::default(),
            &AuditSettings::default(),
        );
        assert!(result.is_err());
    }
}
