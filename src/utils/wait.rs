//! Bounded, cancellable polling.
//!
//! Every wait in the restore flow goes through [`wait_until`]: a fixed poll
//! interval, a total time budget, and a cancellation token checked between
//! polls. A wait reports how it ended instead of blocking indefinitely.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{AppError, Result};
use crate::rds::{RdsOperations, STATUS_AVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut { waited: Duration, attempts: u32 },
    Cancelled,
}

impl WaitOutcome {
    /// Turn a non-ready outcome into the matching retryable error.
    pub fn into_result(self, resource: &str) -> Result<()> {
        match self {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::TimedOut { waited, attempts } => Err(AppError::WaitTimeout {
                resource: resource.to_string(),
                waited,
                attempts,
            }),
            WaitOutcome::Cancelled => Err(AppError::Cancelled(resource.to_string())),
        }
    }
}

/// Poll `check` until it returns `Ok(true)`, the budget runs out, or `cancel` fires.
///
/// The first check runs immediately. An error from `check` ends the wait.
pub async fn wait_until<F, Fut>(
    config: WaitConfig,
    cancel: &CancellationToken,
    resource: &str,
    mut check: F,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }

        attempts += 1;
        if check().await? {
            debug!(resource = %resource, attempts, "ready");
            return Ok(WaitOutcome::Ready);
        }

        let waited = start.elapsed();
        if waited.saturating_add(config.interval) > config.timeout {
            return Ok(WaitOutcome::TimedOut { waited, attempts });
        }

        debug!(
            resource = %resource,
            attempt = attempts,
            delay_secs = config.interval.as_secs(),
            "not ready, polling again"
        );

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
        }
    }
}

/// Sleep for `delay` unless cancelled first.
pub async fn settle(delay: Duration, cancel: &CancellationToken, resource: &str) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(AppError::Cancelled(resource.to_string())),
    }
}

const SNAPSHOT_FAILURE_STATES: &[&str] = &[
    "failed",
    "deleted",
    "deleting",
    "incompatible-restore",
    "incompatible-parameters",
];

const INSTANCE_FAILURE_STATES: &[&str] = &[
    "failed",
    "deleting",
    "incompatible-restore",
    "incompatible-parameters",
    "incompatible-network",
    "inaccessible-encryption-credentials",
    "restore-error",
    "storage-full",
];

pub async fn wait_for_snapshot_available<C: RdsOperations>(
    ops: &C,
    snapshot_id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<WaitOutcome> {
    wait_until(config, cancel, snapshot_id, || async move {
        match ops.describe_snapshot(snapshot_id).await? {
            Some(s) if s.is_available() => Ok(true),
            Some(s) if SNAPSHOT_FAILURE_STATES.contains(&s.status.as_str()) => {
                Err(AppError::UnexpectedState {
                    resource: format!("snapshot {}", snapshot_id),
                    status: s.status,
                })
            }
            _ => Ok(false),
        }
    })
    .await
}

pub async fn wait_for_instance_available<C: RdsOperations>(
    ops: &C,
    instance_id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<WaitOutcome> {
    wait_until(config, cancel, instance_id, || async move {
        match ops.describe_instance(instance_id).await? {
            Some(i) if i.status == STATUS_AVAILABLE => Ok(true),
            Some(i) if INSTANCE_FAILURE_STATES.contains(&i.status.as_str()) => {
                Err(AppError::UnexpectedState {
                    resource: format!("DB instance {}", instance_id),
                    status: i.status,
                })
            }
            _ => Ok(false),
        }
    })
    .await
}

pub async fn wait_for_instance_deleted<C: RdsOperations>(
    ops: &C,
    instance_id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
) -> Result<WaitOutcome> {
    wait_until(config, cancel, instance_id, || async move {
        Ok(ops.describe_instance(instance_id).await?.is_none())
    })
    .await
}
