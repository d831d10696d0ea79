// rdsrestore/src/rds/client.rs
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_rds as rds;
use rds::types::{DbInstance, Tag};
use tracing::debug;

use super::error::{DB_INSTANCE, DB_SNAPSHOT, classify_sdk_error};
use super::{InstanceInfo, RdsOperations, ResourceTag, RestoreRequest, Result, SnapshotInfo};

/// `RdsOperations` over the AWS SDK.
#[derive(Clone, Debug)]
pub struct RdsClient {
    client: rds::Client,
}

impl RdsClient {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: rds::Client::new(sdk_config),
        }
    }

    /// Load credentials and region from the default provider chain, with an
    /// optional explicit region.
    pub async fn from_env(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;
        Self::new(&sdk_config)
    }
}

impl From<&DbInstance> for InstanceInfo {
    fn from(db: &DbInstance) -> Self {
        InstanceInfo {
            identifier: db.db_instance_identifier().unwrap_or_default().to_string(),
            arn: db.db_instance_arn().map(str::to_string),
            status: db.db_instance_status().unwrap_or_default().to_string(),
            deletion_protection: db.deletion_protection().unwrap_or(false),
            instance_class: db.db_instance_class().map(str::to_string),
            publicly_accessible: db.publicly_accessible(),
            option_group: db
                .option_group_memberships()
                .first()
                .and_then(|m| m.option_group_name())
                .map(str::to_string),
            subnet_group: db
                .db_subnet_group()
                .and_then(|g| g.db_subnet_group_name())
                .map(str::to_string),
            parameter_group: db
                .db_parameter_groups()
                .first()
                .and_then(|g| g.db_parameter_group_name())
                .map(str::to_string),
            security_group_ids: db
                .vpc_security_groups()
                .iter()
                .filter_map(|sg| sg.vpc_security_group_id())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Keyless tags cannot be written back on restore, so they are skipped.
fn resource_tag(tag: &Tag) -> Option<ResourceTag> {
    let key = tag.key()?;
    Some(ResourceTag::new(key, tag.value().unwrap_or_default()))
}

impl RdsOperations for RdsClient {
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>> {
        match self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
        {
            Ok(output) => Ok(output.db_instances().first().map(InstanceInfo::from)),
            Err(e) => {
                let err = classify_sdk_error(&e, DB_INSTANCE, instance_id);
                if err.is_not_found() {
                    debug!(instance = %instance_id, "DB instance does not exist");
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn describe_snapshot(&self, snapshot_id: &str) -> Result<Option<SnapshotInfo>> {
        match self
            .client
            .describe_db_snapshots()
            .db_snapshot_identifier(snapshot_id)
            .send()
            .await
        {
            Ok(output) => Ok(output.db_snapshots().first().map(|s| SnapshotInfo {
                identifier: s
                    .db_snapshot_identifier()
                    .unwrap_or(snapshot_id)
                    .to_string(),
                status: s.status().unwrap_or_default().to_string(),
            })),
            Err(e) => {
                let err = classify_sdk_error(&e, DB_SNAPSHOT, snapshot_id);
                if err.is_not_found() {
                    debug!(snapshot = %snapshot_id, "DB snapshot does not exist");
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn list_tags(&self, resource_arn: &str) -> Result<Vec<ResourceTag>> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_name(resource_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_INSTANCE, resource_arn))?;

        Ok(output.tag_list().iter().filter_map(resource_tag).collect())
    }

    async fn copy_snapshot(&self, source_id: &str, target_id: &str, kms_key_id: &str) -> Result<()> {
        self.client
            .copy_db_snapshot()
            .source_db_snapshot_identifier(source_id)
            .target_db_snapshot_identifier(target_id)
            .kms_key_id(kms_key_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_SNAPSHOT, target_id))?;
        Ok(())
    }

    async fn restore_from_snapshot(&self, request: &RestoreRequest) -> Result<()> {
        let tags: Vec<Tag> = request
            .tags
            .iter()
            .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
            .collect();
        let security_groups =
            (!request.security_group_ids.is_empty()).then(|| request.security_group_ids.clone());

        self.client
            .restore_db_instance_from_db_snapshot()
            .db_instance_identifier(&request.instance_id)
            .db_snapshot_identifier(&request.snapshot_id)
            .set_db_instance_class(request.instance_class.clone())
            .set_publicly_accessible(request.publicly_accessible)
            .set_option_group_name(request.option_group.clone())
            .set_db_subnet_group_name(request.subnet_group.clone())
            .set_db_parameter_group_name(request.parameter_group.clone())
            .set_vpc_security_group_ids(security_groups)
            .set_tags((!tags.is_empty()).then_some(tags))
            .deletion_protection(request.deletion_protection)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_INSTANCE, &request.instance_id))?;
        Ok(())
    }

    async fn set_deletion_protection(&self, instance_id: &str, enabled: bool) -> Result<()> {
        self.client
            .modify_db_instance()
            .db_instance_identifier(instance_id)
            .deletion_protection(enabled)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_INSTANCE, instance_id))?;
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        self.client
            .delete_db_instance()
            .db_instance_identifier(instance_id)
            .skip_final_snapshot(true)
            .delete_automated_backups(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_INSTANCE, instance_id))?;
        Ok(())
    }

    async fn rename_instance(&self, instance_id: &str, new_instance_id: &str) -> Result<()> {
        self.client
            .modify_db_instance()
            .db_instance_identifier(instance_id)
            .new_db_instance_identifier(new_instance_id)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, DB_INSTANCE, instance_id))?;
        Ok(())
    }
}
