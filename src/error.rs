// src/error.rs
// Standardized error types for Sentira

use thiserror::Error;

use crate::config::ProfileError;
use crate::llm::PipelineError;

/// Main error type for the Sentira library
#[derive(Error, Debug)]
pub enum SentiraError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document not found: {0}")]
    DocumentNotFound(i64),

    #[error("sentence not found: {0}")]
    SentenceNotFound(i64),

    /// Both validation stages failed. The request itself succeeded; the raw
    /// response is retained in the archive/trace observers.
    #[error("LLM output failed validation")]
    OutputNotParseable,

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using SentiraError
pub type Result<T> = std::result::Result<T, SentiraError>;
