// rdsrestore/src/invocation.rs
//! One trigger in, one structured result out.

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{RawConfig, RestoreConfig};
use crate::rds::RdsOperations;
use crate::restore::{InvocationResult, Outcome, run_restore_flow};

/// Waits are cancelled this long before the Lambda deadline so the invocation
/// can still report retry-later.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(15);

pub async fn handle_event<C: RdsOperations>(
    ops: &C,
    raw: &RawConfig,
    event: &Value,
    cancel: &CancellationToken,
) -> InvocationResult {
    info!(event = %event, "Event received");

    let outcome = match RestoreConfig::resolve(raw) {
        Ok(config) => run_restore_flow(ops, &config, cancel).await,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            Outcome::Error {
                message: e.to_string(),
            }
        }
    };

    info!(
        status = outcome.status_code(),
        message = %outcome.message(),
        "Invocation finished"
    );
    outcome.to_result()
}

/// Token that fires `margin` before `deadline_ms` (milliseconds since the epoch).
///
/// Abort the returned handle once the invocation is done.
pub fn cancel_before_deadline(
    deadline_ms: u64,
    margin: Duration,
) -> (CancellationToken, JoinHandle<()>) {
    let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now_ms)).saturating_sub(margin);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(remaining).await;
        trigger.cancel();
    });
    (token, handle)
}
