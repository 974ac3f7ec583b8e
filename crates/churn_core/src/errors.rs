//! Error types for the churn core

use thiserror::Error;

/// Errors raised while loading or running the churn classifier
#[derive(Error, Debug)]
pub enum ChurnError {
    /// No model artifact was loaded at startup
    #[error("Modelo não carregado")]
    ModelUnavailable,

    /// Artifact parsed but its contents are unusable
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for churn core operations
pub type Result<T> = std::result::Result<T, ChurnError>;
