//! Test helpers: stand-in executables and input files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RunnerSettings;

/// Write an executable shell script standing in for the calculation program.
#[cfg(unix)]
pub fn fake_program(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let path = dir.join("fake_orca");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write `<dir>/<name>.inp` and return its path.
pub fn write_input(dir: &Path, name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{}.inp", name));
    fs::write(&path, "! XTB2 Opt\n* xyz 0 1\nH 0.0 0.0 0.0\nH 0.0 0.0 0.74\n*\n").unwrap();
    path
}

/// Runner settings pointing at `executable`, polling quickly.
pub fn runner_settings(executable: &Path) -> RunnerSettings {
    RunnerSettings {
        executable: executable.to_path_buf(),
        poll_interval_ms: 10,
        ..RunnerSettings::default()
    }
}
