//! Error types for the tabml library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`TabmlError`] enum. Validation and artifact lookup failures propagate to
//! the caller unchanged; per-algorithm and per-record failures are absorbed
//! into result records by the trainer and predictor instead of surfacing
//! here.

use std::io;

use thiserror::Error;

/// The main error type for tabml operations.
#[derive(Error, Debug)]
pub enum TabmlError {
    /// Malformed or missing required input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested artifact identifier has no backing file.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// The artifact file exists but does not contain the expected shape.
    #[error("Artifact format error: {0}")]
    ArtifactFormat(String),

    /// An algorithm's fit/predict step failed. The trainer converts this
    /// into a per-algorithm failure record.
    #[error("Algorithm error: {0}")]
    Algorithm(String),

    /// I/O errors (artifact files, dataset files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary artifact serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invariant violations that indicate a bug rather than bad input.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for operations that may fail with [`TabmlError`].
pub type Result<T> = std::result::Result<T, TabmlError>;

impl TabmlError {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        TabmlError::Validation(msg.into())
    }

    /// Create a new artifact-not-found error.
    pub fn artifact_not_found<S: Into<String>>(msg: S) -> Self {
        TabmlError::ArtifactNotFound(msg.into())
    }

    /// Create a new artifact format error.
    pub fn artifact_format<S: Into<String>>(msg: S) -> Self {
        TabmlError::ArtifactFormat(msg.into())
    }

    /// Create a new algorithm error.
    pub fn algorithm<S: Into<String>>(msg: S) -> Self {
        TabmlError::Algorithm(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        TabmlError::Serialization(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        TabmlError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TabmlError::validation("target column missing");
        assert_eq!(error.to_string(), "Validation error: target column missing");

        let error = TabmlError::artifact_not_found("model_abc.model");
        assert_eq!(error.to_string(), "Artifact not found: model_abc.model");

        let error = TabmlError::algorithm("fit diverged");
        assert_eq!(error.to_string(), "Algorithm error: fit diverged");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = TabmlError::from(io_error);

        match error {
            TabmlError::Io(_) => {}
            _ => panic!("expected Io variant"),
        }
    }
}
