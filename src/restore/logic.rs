// rdsrestore/src/restore/logic.rs
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::outcome::Outcome;
use super::snapshot::ensure_snapshot;
use super::state::{ObservedState, Plan, Step, plan};
use crate::config::RestoreConfig;
use crate::errors::Result;
use crate::rds::{InstanceInfo, RdsOperations, ResourceTag, RestoreRequest, STATUS_DELETING};
use crate::utils::naming::TAG_SOURCE_SNAPSHOT;
use crate::utils::wait::{
    settle, wait_for_instance_available, wait_for_instance_deleted, wait_until,
};

/// Tag keys with this prefix are reserved by AWS and rejected on create
const RESERVED_TAG_PREFIX: &str = "aws:";

enum RenameResult {
    Landed,
    /// Another invocation's rename already took effect
    AlreadyLanded,
    NotReady(String),
}

/// Observe both instance names, plan the remaining steps, run them.
pub async fn perform_restore_orchestration<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let original = ops.describe_instance(&config.source_db).await?;
    let restored = ops.describe_instance(&config.restored_db).await?;

    // Tags are read only when a restore may follow: for the completion marker
    // and to carry them over to the new instance.
    let original_tags = match (&original, &restored) {
        (Some(source), None) => source_tags(ops, source).await?,
        _ => Vec::new(),
    };

    let observed = ObservedState::new(original.as_ref(), &original_tags, restored.as_ref());
    info!(
        source = %config.source_db,
        restored = %config.restored_db,
        original_exists = observed.original_exists,
        restored_exists = observed.restored_exists,
        restored_available = observed.restored_available,
        "Observed instance state"
    );

    let completed_snapshot = config
        .snapshot_id
        .as_deref()
        .filter(|_| config.skip_if_already_restored);
    let steps = match plan(&observed, completed_snapshot) {
        Plan::NothingToDo => {
            info!(source = %config.source_db, "Neither the source nor a restored instance exists");
            return Ok(Outcome::NotFound {
                instance: config.source_db.clone(),
            });
        }
        Plan::AlreadyComplete { snapshot } => {
            info!(source = %config.source_db, snapshot = %snapshot, "Restore already complete");
            return Ok(Outcome::AlreadyComplete {
                instance: config.source_db.clone(),
                snapshot,
            });
        }
        Plan::Run(steps) => steps,
    };
    info!(?steps, "Resuming restore");

    let replaces_original = steps
        .iter()
        .any(|s| matches!(s, Step::Restore | Step::DeleteOriginal));
    let mut restored_from = None;

    for step in steps {
        match step {
            Step::Restore => {
                let snapshot =
                    restore_instance(ops, config, original.as_ref(), &original_tags, cancel)
                        .await?;
                restored_from = Some(snapshot);
            }
            Step::AwaitRestored => {
                info!(instance = %config.restored_db, "Waiting for restore started earlier");
                wait_for_instance_available(ops, &config.restored_db, config.wait, cancel)
                    .await?
                    .into_result(&config.restored_db)?;
            }
            Step::DeleteOriginal => delete_original(ops, config, cancel).await?,
            Step::Rename => match rename_restored(ops, config, cancel).await? {
                RenameResult::NotReady(reason) => return Ok(Outcome::RetryLater { reason }),
                RenameResult::Landed | RenameResult::AlreadyLanded => {}
            },
        }
    }

    info!(
        instance = %config.source_db,
        "Restore, delete, and rename complete. Only the original name remains."
    );
    let instance = config.source_db.clone();
    Ok(if replaces_original {
        Outcome::Replaced {
            instance,
            snapshot: restored_from,
        }
    } else {
        Outcome::Renamed { instance }
    })
}

async fn source_tags<C: RdsOperations>(ops: &C, source: &InstanceInfo) -> Result<Vec<ResourceTag>> {
    match source.arn.as_deref() {
        Some(arn) => Ok(ops.list_tags(arn).await?),
        None => Ok(Vec::new()),
    }
}

/// Build the restore request so the new instance matches the source's current
/// configuration. Without a source only the snapshot's own settings apply.
pub fn build_restore_request(
    config: &RestoreConfig,
    snapshot_id: &str,
    source: Option<&InstanceInfo>,
    source_tags: &[ResourceTag],
) -> RestoreRequest {
    let mut tags: Vec<ResourceTag> = source_tags
        .iter()
        .filter(|t| !t.key.starts_with(RESERVED_TAG_PREFIX) && t.key != TAG_SOURCE_SNAPSHOT)
        .cloned()
        .collect();
    if let Some(configured) = config.snapshot_id.as_deref() {
        tags.push(ResourceTag::new(TAG_SOURCE_SNAPSHOT, configured));
    }

    let mut request = RestoreRequest {
        instance_id: config.restored_db.clone(),
        snapshot_id: snapshot_id.to_string(),
        tags,
        deletion_protection: true,
        ..Default::default()
    };
    if let Some(source) = source {
        request.instance_class = source.instance_class.clone();
        request.publicly_accessible = source.publicly_accessible;
        request.option_group = source.option_group.clone();
        request.subnet_group = source.subnet_group.clone();
        request.parameter_group = source.parameter_group.clone();
        request.security_group_ids = source.security_group_ids.clone();
    }
    request
}

async fn restore_instance<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    source: Option<&InstanceInfo>,
    source_tags: &[ResourceTag],
    cancel: &CancellationToken,
) -> Result<String> {
    let snapshot = ensure_snapshot(ops, config, cancel).await?;
    let request = build_restore_request(config, &snapshot, source, source_tags);

    info!(
        snapshot = %snapshot,
        instance = %request.instance_id,
        instance_class = ?request.instance_class,
        "Restoring DB instance from snapshot"
    );
    match ops.restore_from_snapshot(&request).await {
        Ok(()) => info!("Restore initiated. Waiting for instance to be available..."),
        Err(e) if e.is_already_exists() => {
            warn!(instance = %request.instance_id, "Restore was started concurrently, waiting on it")
        }
        Err(e) => return Err(e.into()),
    }

    wait_for_instance_available(ops, &config.restored_db, config.wait, cancel)
        .await?
        .into_result(&config.restored_db)?;
    info!(instance = %config.restored_db, "Restored instance is available");
    Ok(snapshot)
}

async fn delete_original<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let source = &config.source_db;
    let Some(original) = ops.describe_instance(source).await? else {
        info!(instance = %source, "Original instance does not exist or already deleted");
        return Ok(());
    };

    if original.status == STATUS_DELETING {
        info!(instance = %source, "Delete already in progress");
    } else {
        if original.deletion_protection {
            info!(instance = %source, "Disabling deletion protection");
            match ops.set_deletion_protection(source, false).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    info!(instance = %source, "Original instance disappeared, may have already been deleted");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            settle(config.protection_settle, cancel, source).await?;
        }

        info!(instance = %source, "Deleting original instance");
        match ops.delete_instance(source).await {
            Ok(()) => info!(instance = %source, "Delete initiated"),
            Err(e) if e.is_not_found() => {
                info!(instance = %source, "Original instance not found, may have already been deleted");
                return Ok(());
            }
            Err(e) if e.is_invalid_state() => {
                let deleting = ops
                    .describe_instance(source)
                    .await?
                    .is_none_or(|i| i.status == STATUS_DELETING);
                if !deleting {
                    return Err(e.into());
                }
                info!(instance = %source, "Original instance is already being deleted");
            }
            Err(e) => return Err(e.into()),
        }
    }

    wait_for_instance_deleted(ops, source, config.wait, cancel)
        .await?
        .into_result(source)?;
    info!(instance = %source, "Original instance deleted");
    Ok(())
}

async fn rename_restored<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    cancel: &CancellationToken,
) -> Result<RenameResult> {
    let (from, to) = (&config.restored_db, &config.source_db);

    match ops.describe_instance(from).await? {
        None => {
            return Ok(match ops.describe_instance(to).await? {
                Some(current) if current.is_available() => {
                    info!(instance = %to, "Rename already took effect");
                    RenameResult::AlreadyLanded
                }
                _ => RenameResult::NotReady(format!(
                    "{} no longer exists and {} is not available yet",
                    from, to
                )),
            });
        }
        Some(restored) if !restored.is_available() => {
            return Ok(RenameResult::NotReady(format!(
                "{} is '{}', not available for rename",
                from, restored.status
            )));
        }
        Some(_) => {}
    }

    info!(from = %from, to = %to, "Renaming restored instance");
    match ops.rename_instance(from, to).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            warn!(instance = %from, "Restored instance vanished before rename, checking whether a rename landed")
        }
        Err(e) => return Err(e.into()),
    }

    // The new name does not resolve immediately after the rename is accepted.
    wait_until(config.rename_wait, cancel, to, || async move {
        Ok(ops
            .describe_instance(to)
            .await?
            .is_some_and(|i| i.is_available()))
    })
    .await?
    .into_result(to)?;

    info!(instance = %to, "Renamed instance is available");
    Ok(RenameResult::Landed)
}
