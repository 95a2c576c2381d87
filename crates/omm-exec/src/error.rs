//! Execution error types.

use thiserror::Error;

use omm_core::GatewayError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("batch outcome count mismatch: sent {sent}, got {got}")]
    OutcomeMismatch { sent: usize, got: usize },
}

pub type ExecResult<T> = Result<T, ExecError>;
