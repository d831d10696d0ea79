// rdsrestore/src/restore/outcome.rs
use serde::Serialize;

/// Result of one invocation. Execution history is never stored; this value is
/// all a caller learns about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The restored instance was renamed to the source name (nothing else was needed)
    Renamed { instance: String },
    /// Restore and/or delete ran, then the rename
    Replaced {
        instance: String,
        snapshot: Option<String>,
    },
    /// The source name already belongs to an instance restored from this snapshot
    AlreadyComplete { instance: String, snapshot: String },
    /// Neither the source nor a restored instance exists
    NotFound { instance: String },
    /// Work is in flight; invoke again later
    RetryLater { reason: String },
    Error { message: String },
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Renamed { .. } | Outcome::Replaced { .. } | Outcome::AlreadyComplete { .. } => {
                200
            }
            Outcome::RetryLater { .. } => 202,
            Outcome::NotFound { .. } => 404,
            Outcome::Error { .. } => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Outcome::Renamed { instance } => format!(
                "Renamed restored instance to {}. Only the original name remains.",
                instance
            ),
            Outcome::Replaced {
                instance,
                snapshot: Some(snapshot),
            } => format!(
                "Restored snapshot {} to a new instance, deleted the original, and renamed the restored instance to {}.",
                snapshot, instance
            ),
            Outcome::Replaced {
                instance,
                snapshot: None,
            } => format!(
                "Deleted the original instance and renamed the restored instance to {}.",
                instance
            ),
            Outcome::AlreadyComplete { instance, snapshot } => format!(
                "{} is already restored from snapshot {}; nothing to do.",
                instance, snapshot
            ),
            Outcome::NotFound { instance } => format!(
                "Neither {} nor a restored instance exists; nothing to do.",
                instance
            ),
            Outcome::RetryLater { reason } => format!("In progress, retry later: {}", reason),
            Outcome::Error { message } => message.clone(),
        }
    }

    pub fn to_result(&self) -> InvocationResult {
        InvocationResult {
            status_code: self.status_code(),
            body: self.message(),
        }
    }
}

/// Wire shape returned to the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        let instance = "orders-db".to_string();
        assert_eq!(Outcome::Renamed { instance: instance.clone() }.status_code(), 200);
        assert_eq!(
            Outcome::Replaced {
                instance: instance.clone(),
                snapshot: None
            }
            .status_code(),
            200
        );
        assert_eq!(
            Outcome::AlreadyComplete {
                instance: instance.clone(),
                snapshot: "s".to_string()
            }
            .status_code(),
            200
        );
        assert_eq!(Outcome::NotFound { instance }.status_code(), 404);
        assert_eq!(
            Outcome::RetryLater {
                reason: "renaming".to_string()
            }
            .status_code(),
            202
        );
        assert_eq!(
            Outcome::Error {
                message: "boom".to_string()
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_result_serializes_like_a_lambda_response() -> anyhow::Result<()> {
        let result = Outcome::Error {
            message: "SNAPSHOT_ID is not set".to_string(),
        }
        .to_result();

        assert_eq!(
            serde_json::to_value(&result)?,
            json!({"statusCode": 500, "body": "SNAPSHOT_ID is not set"})
        );
        Ok(())
    }
}
