use crate::cli::InitConfigArgs;
use crate::error::{CliError, Result};
use flotte_core::config::ConfigManager;
use tracing::info;

pub fn run(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        return Err(CliError::Argument(format!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        )));
    }

    let manager = ConfigManager::new(&args.path);
    manager.save()?;
    info!("Wrote default configuration to {}", args.path.display());
    println!("Wrote {}", args.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotte_core::config::Settings;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_loadable_defaults_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flotte.toml");

        run(InitConfigArgs {
            path: path.clone(),
            force: false,
        })
        .unwrap();

        let mut manager = ConfigManager::new(&path);
        manager.load().unwrap();
        assert_eq!(manager.settings(), &Settings::default());

        let again = run(InitConfigArgs {
            path: path.clone(),
            force: false,
        });
        assert!(matches!(again, Err(CliError::Argument(_))));

        fs::write(&path, "[queue]\nmax_workers = 3\n").unwrap();
        run(InitConfigArgs { path: path.clone(), force: true }).unwrap();
        manager.load().unwrap();
        assert_eq!(manager.settings().queue.max_workers, None);
    }
}
