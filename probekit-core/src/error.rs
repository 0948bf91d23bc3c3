//! Error types for probekit operations

use crate::pipeline::PipelineStage;

/// Result type for probekit operations
pub type Result<T> = std::result::Result<T, ProbekitError>;

/// Error types for the evaluation pipeline
#[derive(Debug, thiserror::Error)]
pub enum ProbekitError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stage transition was requested without its prerequisites
    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
        reason: String,
    },

    /// A pipeline stage failed and halted the run
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed {
        stage: PipelineStage,
        message: String,
    },

    /// No persisted state for the run id
    #[error("No pipeline state found for run '{0}'")]
    StateNotFound(String),

    /// State store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ProbekitError {
    /// Shorthand for a stage failure
    pub fn stage(stage: PipelineStage, message: impl Into<String>) -> Self {
        ProbekitError::StageFailed {
            stage,
            message: message.into(),
        }
    }
}

impl From<String> for ProbekitError {
    fn from(s: String) -> Self {
        ProbekitError::Other(s)
    }
}

impl From<&str> for ProbekitError {
    fn from(s: &str) -> Self {
        ProbekitError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ProbekitError {
    fn from(err: anyhow::Error) -> Self {
        ProbekitError::Other(err.to_string())
    }
}
