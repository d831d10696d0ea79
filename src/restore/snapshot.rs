// rdsrestore/src/restore/snapshot.rs
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RestoreConfig;
use crate::errors::{AppError, Result};
use crate::rds::RdsOperations;
use crate::utils::naming::sanitize_snapshot_id;
use crate::utils::wait::wait_for_snapshot_available;

/// Make sure there is an available snapshot to restore from and return its identifier.
///
/// With a KMS key configured the snapshot is first copied (re-encrypted) to a
/// deterministic name, so repeated invocations reuse one copy instead of
/// creating new ones.
pub async fn ensure_snapshot<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    cancel: &CancellationToken,
) -> Result<String> {
    let snapshot_id = config.snapshot_id.as_deref().ok_or_else(|| {
        AppError::Config(
            "SNAPSHOT_ID environment variable is not set or empty and no restored instance exists"
                .to_string(),
        )
    })?;

    let target = match config.kms_key_arn.as_deref() {
        Some(kms_key_arn) => {
            let copy_id = sanitize_snapshot_id(snapshot_id)?;
            copy_if_missing(ops, snapshot_id, &copy_id, kms_key_arn).await?;
            copy_id
        }
        None => {
            if ops.describe_snapshot(snapshot_id).await?.is_none() {
                return Err(AppError::MissingSnapshot(snapshot_id.to_string()));
            }
            snapshot_id.to_string()
        }
    };

    match ops.describe_snapshot(&target).await? {
        Some(s) if s.is_available() => {
            info!(snapshot = %target, "Snapshot already available");
        }
        _ => {
            info!(snapshot = %target, "Waiting for snapshot to become available");
            wait_for_snapshot_available(ops, &target, config.wait, cancel)
                .await?
                .into_result(&format!("snapshot {}", target))?;
            info!(snapshot = %target, "Snapshot is now available");
        }
    }

    Ok(target)
}

async fn copy_if_missing<C: RdsOperations>(
    ops: &C,
    source_id: &str,
    copy_id: &str,
    kms_key_arn: &str,
) -> Result<()> {
    if ops.describe_snapshot(copy_id).await?.is_some() {
        info!(snapshot = %copy_id, "Snapshot copy already exists");
        return Ok(());
    }

    info!(
        source = %source_id,
        target = %copy_id,
        kms_key = %kms_key_arn,
        "Copying snapshot"
    );
    match ops.copy_snapshot(source_id, copy_id, kms_key_arn).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_exists() => {
            info!(snapshot = %copy_id, "Snapshot copy was started concurrently");
            Ok(())
        }
        Err(e) if e.is_not_found() => Err(AppError::MissingSnapshot(source_id.to_string())),
        Err(e) => Err(e.into()),
    }
}
