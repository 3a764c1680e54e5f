//! Error types for Myoscore

use thiserror::Error;

/// Errors that can occur during scoring and configuration resolution
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("Configuration fetch failed: {0}")]
    ConfigError(String),

    #[error("Recompute request failed: {0}")]
    RecomputeError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}
