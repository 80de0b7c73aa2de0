use flotte_core::config::ConfigError;
use flotte_core::jobs::DiscoveryError;
use flotte_core::orchestrator::ReportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[source] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
