use thiserror::Error;

use crate::config::ConfigError;
use crate::parser::ParseError;
use crate::parser::merge::ValidationError;
use crate::variable::config::VariableFileError;

#[derive(Error, Debug)]
pub enum RestbundleError {
    #[error("Bundle error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Variable file error: {0}")]
    VariableFile(#[from] VariableFileError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown request: {0}")]
    UnknownRequest(String),
}

/// Result type for restbundle crate
pub type Result<T> = std::result::Result<T, RestbundleError>;
