use crate::config_manager::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ExplainerError>;
