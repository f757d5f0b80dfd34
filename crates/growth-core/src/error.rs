//! Error types for growth-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Case library unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid state transition: {0} -> {1}")]
    InvalidStateTransition(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

}

impl Error {
    /// Reclassify a collaborator failure for callers of the ranking pipeline.
    ///
    /// Caller mistakes (`RunNotFound`, `InvalidInput`) pass through untouched;
    /// anything else the storage side produced becomes `Unavailable`.
    pub fn into_unavailable(self) -> Self {
        match self {
            Error::RunNotFound(_) | Error::InvalidInput(_) | Error::Unavailable(_) => self,
            other => Error::Unavailable(other.to_string()),
        }
    }

    /// Whether this error is a transient storage failure
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
