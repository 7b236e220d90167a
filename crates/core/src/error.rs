use thiserror::Error;

pub type AdResult<T> = Result<T, AdError>;

#[derive(Error, Debug)]
pub enum AdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid value: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AdError {
    fn from(e: config::ConfigError) -> Self {
        AdError::Config(e.to_string())
    }
}
