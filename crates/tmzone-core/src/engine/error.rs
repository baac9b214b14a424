use super::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("No selected residues left to place a membrane against")]
    NoSelectedResidues,

    #[error("An internal logic error occurred: {0}")]
    Internal(String),
}
