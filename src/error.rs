//! Error types for scriptvox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptvoxError {
    // Pipeline preconditions
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Timeout after {budget_ms}ms during {stage}")]
    Timeout { stage: String, budget_ms: u64 },

    // External audio engine errors
    #[error("Audio engine not found: {command}")]
    EngineMissing { command: String },

    #[error("Audio engine command failed ({status}): {command}: {stderr}")]
    Engine {
        command: String,
        status: String,
        stderr: String,
    },

    // Speech backend errors
    #[error("Backend {backend} failed on chunk {chunk_index}: {message}")]
    Backend {
        backend: String,
        chunk_index: usize,
        message: String,
    },

    #[error("Backend not registered: {id}")]
    BackendNotRegistered { id: String },

    #[error("Invalid options for backend {backend}: {message}")]
    InvalidBackendOptions { backend: String, message: String },

    // Script errors
    #[error("Malformed pause marker: {marker}")]
    MalformedMarker { marker: String },

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ScriptvoxError {
    /// Builds a timeout error from a stage label and its budget.
    pub fn timeout(stage: impl Into<String>, budget: std::time::Duration) -> Self {
        Self::Timeout {
            stage: stage.into(),
            budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// True for failures reported by the external engine itself (non-zero exit).
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScriptvoxError>;
