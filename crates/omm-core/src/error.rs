//! Core error types.

use thiserror::Error;

/// Errors from core type parsing and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(#[from] rust_decimal::Error),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
