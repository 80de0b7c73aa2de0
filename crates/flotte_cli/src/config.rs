use crate::cli::RunArgs;
use crate::error::Result;
use flotte_core::config::{ConfigManager, Settings};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "flotte.toml";

/// Load settings from `path`, or from `./flotte.toml` if it exists, or use
/// defaults. An explicit path that does not exist is an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.is_file() {
                return Ok(Settings::default());
            }
            fallback
        }
    };

    let mut manager = ConfigManager::new(path);
    manager.load()?;
    debug!("Using configuration from {}", manager.path().display());
    Ok(manager.into_settings())
}

/// Apply `run` flags on top of loaded settings. Flags win.
pub fn apply_run_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(ref executable) = args.executable {
        settings.runner.executable = executable.clone();
    }
    if let Some(ref dir) = args.input_dir {
        settings.paths.input_dir = Some(dir.clone());
    }
    if let Some(ref dir) = args.output_dir {
        settings.paths.output_dir = Some(dir.clone());
    }
    if let Some(workers) = args.max_workers {
        settings.queue.max_workers = Some(workers);
    }
    if let Some(ref report) = args.report {
        settings.paths.report_file = Some(report.clone());
    }
    if args.no_cleanup {
        settings.cleanup.enabled = false;
    }
}
