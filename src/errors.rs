// rdsrestore/src/errors.rs
use std::time::Duration;
use thiserror::Error;

use crate::rds::RdsError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Rds(#[from] RdsError),

    #[error("Snapshot {0} was not found")]
    MissingSnapshot(String),

    #[error("{resource} entered unexpected state '{status}'")]
    UnexpectedState { resource: String, status: String },

    #[error("Timed out waiting for {resource} after {}s ({attempts} checks)", waited.as_secs())]
    WaitTimeout {
        resource: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("Wait for {0} cancelled before the invocation deadline")]
    Cancelled(String),
}

impl AppError {
    /// Errors that a later invocation can be expected to get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::WaitTimeout { .. } | AppError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
