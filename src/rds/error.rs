//! RDS error classification
//!
//! Maps SDK errors onto the handful of categories the restore flow branches on,
//! using the error code from `ProvideErrorMetadata` rather than message matching.

use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RdsError {
    /// The named resource does not exist (yet, or any more)
    #[error("{resource_type} '{resource_id}' not found")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Create/copy target already exists
    #[error("{resource_type} '{resource_id}' already exists")]
    AlreadyExists {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Resource is in a state that rejects the request (e.g. already deleting)
    #[error("{resource_type} '{resource_id}' is in an invalid state: {message}")]
    InvalidState {
        resource_type: &'static str,
        resource_id: String,
        message: String,
    },

    #[error("RDS rate limit exceeded: {0}")]
    Throttled(String),

    #[error("RDS error ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl RdsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RdsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RdsError::AlreadyExists { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, RdsError::InvalidState { .. })
    }
}

/// Resource kinds used in error messages
pub const DB_INSTANCE: &str = "DB instance";
pub const DB_SNAPSHOT: &str = "DB snapshot";

const NOT_FOUND_CODES: &[&str] = &["DBInstanceNotFound", "DBSnapshotNotFound"];

const ALREADY_EXISTS_CODES: &[&str] = &["DBInstanceAlreadyExists", "DBSnapshotAlreadyExists"];

const INVALID_STATE_CODES: &[&str] = &["InvalidDBInstanceState", "InvalidDBSnapshotState"];

const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an error code/message pair for a specific resource.
pub fn classify(
    code: Option<&str>,
    message: String,
    resource_type: &'static str,
    resource_id: &str,
) -> RdsError {
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => RdsError::NotFound {
            resource_type,
            resource_id: resource_id.to_string(),
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => RdsError::AlreadyExists {
            resource_type,
            resource_id: resource_id.to_string(),
        },
        Some(c) if INVALID_STATE_CODES.contains(&c) => RdsError::InvalidState {
            resource_type,
            resource_id: resource_id.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => RdsError::Throttled(message),
        _ => RdsError::Sdk {
            code: code.map(|c| c.to_string()),
            message,
        },
    }
}

/// Classify an SDK operation error.
pub fn classify_sdk_error<E>(err: &E, resource_type: &'static str, resource_id: &str) -> RdsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = err
        .message()
        .map(|m| m.to_string())
        .unwrap_or_else(|| DisplayErrorContext(err).to_string());
    classify(err.code(), message, resource_type, resource_id)
}
