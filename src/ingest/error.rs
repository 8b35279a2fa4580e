use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// A row the store refused, identified by its line in the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub line: u64,
    pub reason: String,
}

/// Failures of a single ingestion run. Every variant ends the request.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("malformed CSV at line {line}: {message}")]
    Decode { line: u64, message: String },

    #[error("{} row(s) failed to persist, {persisted} stored", .failures.len())]
    Persistence {
        persisted: usize,
        failures: Vec<RowFailure>,
    },

    #[error("upload processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("staging error: {0}")]
    Staging(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn validation(message: impl Into<String>) -> Self {
        IngestError::Validation(message.into())
    }

    /// Short label for logs and the state-machine trace.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation",
            IngestError::Decode { .. } => "decode",
            IngestError::Persistence { .. } => "persistence",
            IngestError::Timeout(_) => "timeout",
            IngestError::Staging(_) => "staging",
            IngestError::Internal(_) => "internal",
        }
    }
}
