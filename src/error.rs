//! Error types for tbloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::LlmError;

/// All error types that can occur in tbloop
#[derive(Debug, Error)]
pub enum TbloopError {
    /// Invalid or inconsistent configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Checker backend could not be invoked
    #[error("Runner error: {0}")]
    Runner(String),

    /// Repair request failed or returned nothing usable
    #[error("Repair error: {0}")]
    Repair(String),

    /// Regeneration of an artifact failed
    #[error("Regeneration error: {0}")]
    Regeneration(String),

    /// Dataset could not be loaded
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for tbloop operations
pub type Result<T> = std::result::Result<T, TbloopError>;
