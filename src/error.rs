//! Error types for the lead triage service.

use std::path::PathBuf;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model artifact errors.
///
/// All of these are fatal at startup — the service must not accept
/// classification traffic unless every artifact loaded and validated.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Model artifact corrupt: {}: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Feature dimension mismatch: classifier expects {expected}, vector has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request classification failures.
///
/// Distinct from "model says uncertain" (that is a NEEDS_REVIEW verdict,
/// not an error). These propagate to the caller unchanged — nothing is
/// retried and nothing is downgraded to a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Vectorization failed in stage {stage}: {reason}")]
    Transform { stage: &'static str, reason: String },

    #[error("Prediction failed in stage {stage}: {reason}")]
    Prediction { stage: &'static str, reason: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
