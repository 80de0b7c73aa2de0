//! Job descriptor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One queued calculation: an input file and the name derived from it.
///
/// The input path is the job's identity. Descriptors are created by
/// discovery and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobDescriptor {
    input_path: PathBuf,
    name: String,
}

impl JobDescriptor {
    /// Create a descriptor for an input file. The job name is the file stem.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let name = derive_job_name(&input_path);
        Self { input_path, name }
    }

    /// Path to the input file.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Job name (input file name without extension).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory containing the input file. The external program runs here.
    pub fn input_dir(&self) -> &Path {
        self.input_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Input file name, passed to the external program as its sole argument.
    pub fn input_file_name(&self) -> &std::ffi::OsStr {
        self.input_path
            .file_name()
            .unwrap_or(self.input_path.as_os_str())
    }

    /// Sibling path with the same stem and the given extension.
    pub fn sibling(&self, extension: &str) -> PathBuf {
        self.input_dir().join(format!("{}.{}", self.name, extension))
    }
}

/// Derive a job name from the input path.
fn derive_job_name(input_path: &Path) -> String {
    input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unnamed".to_string())
}
