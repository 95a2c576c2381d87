//! Account error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("malformed account event: {0}")]
    MalformedEvent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decimal parse error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

pub type AccountResult<T> = Result<T, AccountError>;
