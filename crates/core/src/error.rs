//! Unified error types for the insight sink.
//!
//! Error codes:
//! - VALID_001-002: Envelope validation errors
//! - DB_001: Storage errors
//! - GEN_001: Insight generation errors (background only, never returned to callers)
//! - CONF_001: Configuration errors (fatal at startup)

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed envelope
    InvalidEnvelope,
    /// VALID_002: Envelope payload exceeds size limit
    EnvelopeTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEnvelope => "VALID_001",
            Self::EnvelopeTooLarge => "VALID_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidEnvelope => 400,
            Self::EnvelopeTooLarge => 413,
        }
    }
}

/// Unified error type for the insight sink.
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope rejected before any store mutation.
    #[error("{0}")]
    Validation(String),

    /// Raw envelope over the size limit, rejected before parsing.
    #[error("envelope {size_kb}KB exceeds {limit_kb}KB limit")]
    EnvelopeTooLarge { size_kb: usize, limit_kb: usize },

    /// Schema, transaction, or statement failure. The envelope is not durable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Model call or insight write failure.
    #[error("generation error: {0}")]
    Generation(String),

    /// Invalid identifiers or settings at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => ValidationErrorCode::InvalidEnvelope.http_status(),
            Self::EnvelopeTooLarge { .. } => ValidationErrorCode::EnvelopeTooLarge.http_status(),
            Self::Serialization(_) => 400,
            Self::Storage(_) => 500,
            Self::Generation(_) => 502,
            Self::Configuration(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Serialization(_) => {
                ValidationErrorCode::InvalidEnvelope.code()
            }
            Self::EnvelopeTooLarge { .. } => ValidationErrorCode::EnvelopeTooLarge.code(),
            Self::Storage(_) => "DB_001",
            Self::Generation(_) => "GEN_001",
            Self::Configuration(_) => "CONF_001",
            Self::Internal(_) => "INTERNAL_001",
        }
    }

    /// Whether the caller may safely resubmit the same envelope.
    ///
    /// Failed envelope transactions roll back, so a retry cannot duplicate rows.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
