//! In-memory control plane for tests.
//!
//! Instances and snapshots move through RDS-like states on successive
//! describes, and every mutating call is recorded in order.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::error::{DB_INSTANCE, DB_SNAPSHOT};
use super::{
    InstanceInfo, RdsError, RdsOperations, ResourceTag, RestoreRequest, Result, STATUS_AVAILABLE,
    STATUS_DELETING, SnapshotInfo,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CopySnapshot {
        source: String,
        target: String,
        kms_key_id: String,
    },
    Restore(RestoreRequest),
    SetDeletionProtection {
        instance: String,
        enabled: bool,
    },
    Delete {
        instance: String,
    },
    Rename {
        from: String,
        to: String,
    },
}

/// How an instance leaves its identifier behind another run's back
#[derive(Debug, Clone, PartialEq)]
pub enum Departure {
    Deleted,
    /// Shows up, available, under the new identifier
    RenamedTo(String),
}

#[derive(Debug, Clone)]
pub struct FakeInstance {
    pub info: InstanceInfo,
    pub tags: Vec<ResourceTag>,
    /// Describes left before the status flips to available
    pub polls_until_available: Option<u32>,
    /// Describes that still see the instance before it departs
    pub departs: Option<(Departure, u32)>,
}

impl FakeInstance {
    fn new(info: InstanceInfo, tags: Vec<ResourceTag>) -> Self {
        FakeInstance {
            info,
            tags,
            polls_until_available: None,
            departs: None,
        }
    }

    fn tick_departure(&mut self) -> Option<Departure> {
        let (_, polls) = self.departs.as_mut()?;
        if *polls > 0 {
            *polls -= 1;
            return None;
        }
        self.departs.take().map(|(departure, _)| departure)
    }
}

#[derive(Debug, Clone)]
pub struct FakeSnapshot {
    pub status: String,
    pub polls_until_available: Option<u32>,
}

#[derive(Debug)]
pub struct FakeState {
    pub instances: BTreeMap<String, FakeInstance>,
    pub snapshots: BTreeMap<String, FakeSnapshot>,
    pub calls: Vec<Call>,
    /// Describes a freshly restored instance spends in `creating`
    pub restore_polls: u32,
    /// Renamed instances never show up under their new name
    pub rename_never_lands: bool,
    /// Delete removes the instance but answers not-found, as if a concurrent run got there first
    pub delete_reports_not_found: bool,
    /// Describe of this identifier fails with an access error
    pub failing_describe: Option<String>,
    /// Copy and restore land but answer already-exists, as if a concurrent run issued them
    pub concurrent_creates: bool,
    /// Delete finds a delete already started by a concurrent run
    pub concurrent_delete: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        FakeState {
            instances: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            calls: Vec::new(),
            restore_polls: 2,
            rename_never_lands: false,
            delete_reports_not_found: false,
            failing_describe: None,
            concurrent_creates: false,
            concurrent_delete: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeRds {
    state: Mutex<FakeState>,
}

pub fn instance_arn(instance_id: &str) -> String {
    format!("arn:aws:rds:us-east-1:123456789012:db:{}", instance_id)
}

/// A bare instance in the given status
pub fn instance(instance_id: &str, status: &str) -> InstanceInfo {
    InstanceInfo {
        identifier: instance_id.to_string(),
        arn: Some(instance_arn(instance_id)),
        status: status.to_string(),
        ..Default::default()
    }
}

fn not_found(resource_type: &'static str, id: &str) -> RdsError {
    RdsError::NotFound {
        resource_type,
        resource_id: id.to_string(),
    }
}

fn already_exists(resource_type: &'static str, id: &str) -> RdsError {
    RdsError::AlreadyExists {
        resource_type,
        resource_id: id.to_string(),
    }
}

impl FakeRds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, info: InstanceInfo, tags: Vec<ResourceTag>) -> Self {
        self.state()
            .instances
            .insert(info.identifier.clone(), FakeInstance::new(info, tags));
        self
    }

    pub fn with_snapshot(self, snapshot_id: &str, status: &str) -> Self {
        self.state().snapshots.insert(
            snapshot_id.to_string(),
            FakeSnapshot {
                status: status.to_string(),
                polls_until_available: None,
            },
        );
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn instance(&self, instance_id: &str) -> Option<FakeInstance> {
        self.state().instances.get(instance_id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl RdsOperations for FakeRds {
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>> {
        let mut state = self.state();
        if state.failing_describe.as_deref() == Some(instance_id) {
            return Err(RdsError::Sdk {
                code: Some("AccessDenied".to_string()),
                message: format!("not authorized to describe {}", instance_id),
            });
        }
        let departure = match state.instances.get_mut(instance_id) {
            Some(inst) => inst.tick_departure(),
            None => return Ok(None),
        };
        match departure {
            Some(Departure::Deleted) => {
                state.instances.remove(instance_id);
                return Ok(None);
            }
            Some(Departure::RenamedTo(new_id)) => {
                if let Some(mut inst) = state.instances.remove(instance_id) {
                    inst.info.identifier = new_id.clone();
                    inst.info.arn = Some(instance_arn(&new_id));
                    inst.info.status = STATUS_AVAILABLE.to_string();
                    inst.polls_until_available = None;
                    state.instances.insert(new_id, inst);
                }
                return Ok(None);
            }
            None => {}
        }

        let Some(inst) = state.instances.get_mut(instance_id) else {
            return Ok(None);
        };
        match inst.polls_until_available {
            Some(0) => {
                inst.info.status = STATUS_AVAILABLE.to_string();
                inst.polls_until_available = None;
            }
            Some(n) => inst.polls_until_available = Some(n - 1),
            None => {}
        }
        Ok(Some(inst.info.clone()))
    }

    async fn describe_snapshot(&self, snapshot_id: &str) -> Result<Option<SnapshotInfo>> {
        let mut state = self.state();
        let Some(snap) = state.snapshots.get_mut(snapshot_id) else {
            return Ok(None);
        };
        match snap.polls_until_available {
            Some(0) => {
                snap.status = STATUS_AVAILABLE.to_string();
                snap.polls_until_available = None;
            }
            Some(n) => snap.polls_until_available = Some(n - 1),
            None => {}
        }
        Ok(Some(SnapshotInfo {
            identifier: snapshot_id.to_string(),
            status: snap.status.clone(),
        }))
    }

    async fn list_tags(&self, resource_arn: &str) -> Result<Vec<ResourceTag>> {
        self.state()
            .instances
            .values()
            .find(|i| i.info.arn.as_deref() == Some(resource_arn))
            .map(|i| i.tags.clone())
            .ok_or_else(|| not_found(DB_INSTANCE, resource_arn))
    }

    async fn copy_snapshot(&self, source_id: &str, target_id: &str, kms_key_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::CopySnapshot {
            source: source_id.to_string(),
            target: target_id.to_string(),
            kms_key_id: kms_key_id.to_string(),
        });
        if !state.snapshots.contains_key(source_id) {
            return Err(not_found(DB_SNAPSHOT, source_id));
        }
        if state.snapshots.contains_key(target_id) {
            return Err(already_exists(DB_SNAPSHOT, target_id));
        }
        state.snapshots.insert(
            target_id.to_string(),
            FakeSnapshot {
                status: "creating".to_string(),
                polls_until_available: Some(1),
            },
        );
        if state.concurrent_creates {
            return Err(already_exists(DB_SNAPSHOT, target_id));
        }
        Ok(())
    }

    async fn restore_from_snapshot(&self, request: &RestoreRequest) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Restore(request.clone()));
        if state.instances.contains_key(&request.instance_id) {
            return Err(already_exists(DB_INSTANCE, &request.instance_id));
        }
        if !state.snapshots.contains_key(&request.snapshot_id) {
            return Err(not_found(DB_SNAPSHOT, &request.snapshot_id));
        }
        let polls = state.restore_polls;
        state.instances.insert(
            request.instance_id.clone(),
            FakeInstance {
                departs: None,
                info: InstanceInfo {
                    identifier: request.instance_id.clone(),
                    arn: Some(instance_arn(&request.instance_id)),
                    status: "creating".to_string(),
                    deletion_protection: request.deletion_protection,
                    instance_class: request.instance_class.clone(),
                    publicly_accessible: request.publicly_accessible,
                    option_group: request.option_group.clone(),
                    subnet_group: request.subnet_group.clone(),
                    parameter_group: request.parameter_group.clone(),
                    security_group_ids: request.security_group_ids.clone(),
                },
                tags: request.tags.clone(),
                polls_until_available: Some(polls),
            },
        );
        if state.concurrent_creates {
            return Err(already_exists(DB_INSTANCE, &request.instance_id));
        }
        Ok(())
    }

    async fn set_deletion_protection(&self, instance_id: &str, enabled: bool) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::SetDeletionProtection {
            instance: instance_id.to_string(),
            enabled,
        });
        let inst = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found(DB_INSTANCE, instance_id))?;
        inst.info.deletion_protection = enabled;
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete {
            instance: instance_id.to_string(),
        });
        if state.delete_reports_not_found {
            state.instances.remove(instance_id);
            return Err(not_found(DB_INSTANCE, instance_id));
        }
        let concurrent_delete = state.concurrent_delete;
        let inst = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found(DB_INSTANCE, instance_id))?;
        if concurrent_delete {
            inst.info.status = STATUS_DELETING.to_string();
            inst.departs = Some((Departure::Deleted, 1));
        }
        if inst.info.deletion_protection {
            return Err(RdsError::Sdk {
                code: Some("InvalidParameterCombination".to_string()),
                message: "Cannot delete protected DB Instance".to_string(),
            });
        }
        if inst.info.status == STATUS_DELETING {
            return Err(RdsError::InvalidState {
                resource_type: DB_INSTANCE,
                resource_id: instance_id.to_string(),
                message: "already being deleted".to_string(),
            });
        }
        state.instances.remove(instance_id);
        Ok(())
    }

    async fn rename_instance(&self, instance_id: &str, new_instance_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Rename {
            from: instance_id.to_string(),
            to: new_instance_id.to_string(),
        });
        if state.instances.contains_key(new_instance_id) {
            return Err(already_exists(DB_INSTANCE, new_instance_id));
        }
        let mut inst = state
            .instances
            .remove(instance_id)
            .ok_or_else(|| not_found(DB_INSTANCE, instance_id))?;
        if state.rename_never_lands {
            return Ok(());
        }
        inst.info.identifier = new_instance_id.to_string();
        inst.info.arn = Some(instance_arn(new_instance_id));
        inst.info.status = "renaming".to_string();
        inst.polls_until_available = Some(1);
        state.instances.insert(new_instance_id.to_string(), inst);
        Ok(())
    }
}
