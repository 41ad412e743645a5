use std::path::PathBuf;

use hf_broker::BrokerError;
use hf_project::ConfigError;
use hf_runner::StartupError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read signal catalog: {path}")]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid signal catalog {path}: {source}")]
    Catalog { path: PathBuf, source: BrokerError },

    #[error("Unsupported broker address '{address}' (only mem:// is built in)")]
    UnsupportedBroker { address: String },

    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("Cannot install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to spawn console: {0}")]
    Console(std::io::Error),
}

impl CliError {
    /// 2 for bad input files, 1 for everything that failed while starting.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_)
            | CliError::CatalogRead { .. }
            | CliError::Catalog { .. }
            | CliError::Startup(StartupError::Config(_)) => 2,
            _ => 1,
        }
    }
}
