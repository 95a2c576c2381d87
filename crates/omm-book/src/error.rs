//! Book error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("malformed delta payload: {0}")]
    MalformedPayload(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decimal parse error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

pub type BookResult<T> = Result<T, BookError>;
