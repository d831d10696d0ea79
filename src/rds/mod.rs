//! Database control-plane seam
//!
//! `RdsOperations` is the only way the restore flow touches the cloud. `RdsClient`
//! implements it over `aws-sdk-rds`; tests implement it with an in-memory fake.

pub mod client;
pub mod error;
#[cfg(test)]
pub mod fake;

pub use client::RdsClient;
pub use error::RdsError;

use std::future::Future;

pub type Result<T> = std::result::Result<T, RdsError>;

/// Instance status RDS reports once an instance can serve traffic
pub const STATUS_AVAILABLE: &str = "available";

/// Instance status while a delete is in progress
pub const STATUS_DELETING: &str = "deleting";

/// Key/value tag as RDS stores it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The slice of a DB instance description the restore flow reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceInfo {
    pub identifier: String,
    pub arn: Option<String>,
    pub status: String,
    pub deletion_protection: bool,
    pub instance_class: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub option_group: Option<String>,
    pub subnet_group: Option<String>,
    pub parameter_group: Option<String>,
    pub security_group_ids: Vec<String>,
}

impl InstanceInfo {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub identifier: String,
    pub status: String,
}

impl SnapshotInfo {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

/// Parameters for RestoreDBInstanceFromDBSnapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestoreRequest {
    pub instance_id: String,
    pub snapshot_id: String,
    pub instance_class: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub option_group: Option<String>,
    pub subnet_group: Option<String>,
    pub parameter_group: Option<String>,
    pub security_group_ids: Vec<String>,
    pub tags: Vec<ResourceTag>,
    pub deletion_protection: bool,
}

/// Control-plane operations used by the restore flow.
///
/// Lookups return `Ok(None)` for resources that do not exist; every other
/// failure is a classified `RdsError`. Mutating calls return as soon as RDS
/// accepts the request; callers wait for the resulting state themselves.
pub trait RdsOperations: Send + Sync {
    fn describe_instance(
        &self,
        instance_id: &str,
    ) -> impl Future<Output = Result<Option<InstanceInfo>>> + Send;

    fn describe_snapshot(
        &self,
        snapshot_id: &str,
    ) -> impl Future<Output = Result<Option<SnapshotInfo>>> + Send;

    /// Tags attached to the resource with the given ARN
    fn list_tags(&self, resource_arn: &str) -> impl Future<Output = Result<Vec<ResourceTag>>> + Send;

    fn copy_snapshot(
        &self,
        source_id: &str,
        target_id: &str,
        kms_key_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn restore_from_snapshot(
        &self,
        request: &RestoreRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    fn set_deletion_protection(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete without a final snapshot, dropping automated backups
    fn delete_instance(&self, instance_id: &str) -> impl Future<Output = Result<()>> + Send;

    fn rename_instance(
        &self,
        instance_id: &str,
        new_instance_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
