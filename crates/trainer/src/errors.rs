use churn_core::ChurnError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;

impl From<csv::Error> for TrainerError {
    fn from(err: csv::Error) -> Self {
        TrainerError::Dataset(err.to_string())
    }
}

impl From<ChurnError> for TrainerError {
    fn from(err: ChurnError) -> Self {
        match err {
            ChurnError::Io(e) => TrainerError::Io(e),
            ChurnError::Json(e) => TrainerError::Json(e),
            other => TrainerError::Training(other.to_string()),
        }
    }
}
