//! Error types for photo-poet

use thiserror::Error;

/// Upload limit shown to users, in whole megabytes
pub const MAX_UPLOAD_MB: u64 = 5;

/// Client-side validation errors, resolved before any stage is called
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File is too large. Max {limit_mb}MB allowed.")]
    FileTooLarge { size: u64, limit_mb: u64 },

    #[error("Invalid file type. Please upload an image (PNG, JPG, GIF, WEBP).")]
    InvalidFileType(String),

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Schema violation in {contract}: {reason}")]
    SchemaViolation {
        contract: &'static str,
        reason: String,
    },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn schema(contract: &'static str, reason: impl Into<String>) -> Self {
        Error::SchemaViolation {
            contract,
            reason: reason.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Error::GenerationFailed(reason.into())
    }

    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Error::SchemaViolation { .. })
    }

    pub fn is_generation_failed(&self) -> bool {
        matches!(self, Error::GenerationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
