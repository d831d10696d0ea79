//! Resume-point inference.
//!
//! The only record of progress is what RDS reports right now. `plan` maps a
//! fresh observation of the two instance names onto the steps still to run.

use crate::rds::{InstanceInfo, ResourceTag};
use crate::utils::naming::TAG_SOURCE_SNAPSHOT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub original_exists: bool,
    pub restored_exists: bool,
    pub restored_available: bool,
    /// Value of the source-snapshot marker tag on the instance holding the source name
    pub original_restored_from: Option<String>,
}

impl ObservedState {
    pub fn new(
        original: Option<&InstanceInfo>,
        original_tags: &[ResourceTag],
        restored: Option<&InstanceInfo>,
    ) -> Self {
        ObservedState {
            original_exists: original.is_some(),
            restored_exists: restored.is_some(),
            restored_available: restored.is_some_and(InstanceInfo::is_available),
            original_restored_from: original_tags
                .iter()
                .find(|t| t.key == TAG_SOURCE_SNAPSHOT)
                .map(|t| t.value.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Ensure the snapshot, restore it, wait for the new instance
    Restore,
    /// Wait for a restore started by an earlier invocation
    AwaitRestored,
    DeleteOriginal,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing exists under either name
    NothingToDo,
    /// The source name already holds an instance restored from `completed_snapshot`
    AlreadyComplete { snapshot: String },
    Run(Vec<Step>),
}

/// Pick the steps still to run.
///
/// `completed_snapshot` is only set when re-runs against an already restored
/// snapshot should be skipped. Without it an existing original is always
/// restored over.
pub fn plan(observed: &ObservedState, completed_snapshot: Option<&str>) -> Plan {
    use Step::*;

    match (
        observed.original_exists,
        observed.restored_exists,
        observed.restored_available,
    ) {
        (false, false, _) => Plan::NothingToDo,
        (true, false, _) => match (&observed.original_restored_from, completed_snapshot) {
            (Some(marker), Some(wanted)) if marker == wanted => Plan::AlreadyComplete {
                snapshot: marker.clone(),
            },
            _ => Plan::Run(vec![Restore, DeleteOriginal, Rename]),
        },
        (true, true, true) => Plan::Run(vec![DeleteOriginal, Rename]),
        (true, true, false) => Plan::Run(vec![AwaitRestored, DeleteOriginal, Rename]),
        (false, true, true) => Plan::Run(vec![Rename]),
        (false, true, false) => Plan::Run(vec![AwaitRestored, Rename]),
    }
}
