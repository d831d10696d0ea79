mod logic;
pub(crate) mod outcome;
pub(crate) mod snapshot;
pub(crate) mod state;


use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::RestoreConfig;
use crate::rds::RdsOperations;
pub use outcome::{InvocationResult, Outcome};

/// Public entry point for the restore process.
///
/// Never fails: every error becomes an `Outcome`, with waits that ran out of
/// time or were cancelled reported as retry-later.
pub async fn run_restore_flow<C: RdsOperations>(
    ops: &C,
    config: &RestoreConfig,
    cancel: &CancellationToken,
) -> Outcome {
    match logic::perform_restore_orchestration(ops, config, cancel).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Restore still in progress");
            Outcome::RetryLater {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            error!(error = %e, "Restore failed");
            Outcome::Error {
                message: e.to_string(),
            }
        }
    }
}
