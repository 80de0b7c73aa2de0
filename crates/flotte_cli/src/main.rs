mod cli;
mod commands;
mod config;
mod error;
mod signals;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use flotte_core::config::Settings;
use flotte_core::logging::{init_tracing, LogConfig, LogLevel};
use std::io::IsTerminal;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    let log_config = log_config_for(&cli, &settings);
    let _log_guard = init_tracing(&log_config).map_err(CliError::Logging)?;

    info!("Flotte v{} starting up.", flotte_core::version());
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, settings).await,
        Commands::Audit(args) => commands::audit::run(args, &settings),
        Commands::InitConfig(args) => commands::init_config::run(args),
    };

    if let Err(ref e) = result {
        error!("Command failed: {}", e);
    }
    result
}

fn log_config_for(cli: &Cli, settings: &Settings) -> LogConfig {
    let level = if cli.quiet {
        LogLevel::Error
    } else {
        settings.logging.level.raised_by(cli.verbose)
    };
    let file = cli
        .log_file
        .clone()
        .or_else(|| Some(settings.logging.file.clone()))
        .filter(|p| !p.as_os_str().is_empty());

    LogConfig {
        level,
        file,
        ansi: std::io::stderr().is_terminal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn quiet_and_verbose_pick_levels() {
        let settings = Settings::default();

        let cli = Cli::try_parse_from(["flotte", "-q", "run"]).unwrap();
        assert_eq!(log_config_for(&cli, &settings).level, LogLevel::Error);

        let cli = Cli::try_parse_from(["flotte", "-v", "run"]).unwrap();
        assert_eq!(log_config_for(&cli, &settings).level, LogLevel::Debug);
    }

    #[test]
    fn log_file_flag_wins_and_empty_disables() {
        let mut settings = Settings::default();

        let cli = Cli::try_parse_from(["flotte", "--log-file", "x.log", "run"]).unwrap();
        assert_eq!(log_config_for(&cli, &settings).file, Some(PathBuf::from("x.log")));

        settings.logging.file = PathBuf::new();
        let cli = Cli::try_parse_from(["flotte", "run"]).unwrap();
        assert_eq!(log_config_for(&cli, &settings).file, None);
    }
}
