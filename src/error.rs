use serde_json::Error as JsonError;
use thiserror::Error;

/// Top-level error type for the split engine
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Dynamic split not eligible: {0}")]
    NotEligible(String),

    #[error("Split validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] JsonError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitError {
    /// Recoverable errors degrade to "no dynamic split applied"; the order
    /// itself keeps processing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SplitError::NotEligible(_) | SplitError::Validation(_))
    }
}

impl From<anyhow::Error> for SplitError {
    fn from(error: anyhow::Error) -> Self {
        SplitError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for SplitError {
    fn from(error: rust_decimal::Error) -> Self {
        SplitError::Internal(format!("Decimal conversion error: {:?}", error))
    }
}

/// Result type alias for the split engine
pub type SplitResult<T> = Result<T, SplitError>;
