//! Error types shared by the transit crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, TransitError>;

/// Errors raised by shared utilities
#[derive(Error, Debug)]
pub enum TransitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid load date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
