//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] omm_core::GatewayError),

    #[error("Execution error: {0}")]
    Exec(#[from] omm_exec::ExecError),
}

pub type AppResult<T> = Result<T, AppError>;
