use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlSessionError {
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Duplicate key in result set: {0}")]
    DuplicateKey(String),

    #[error("Other database error: {0}")]
    Other(String),
}
