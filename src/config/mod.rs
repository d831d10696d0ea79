// rdsrestore/src/config/mod.rs
use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::AppError;
use crate::utils::naming::restored_instance_id;
use crate::utils::wait::WaitConfig;

pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_WAIT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_RENAME_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RENAME_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PROTECTION_SETTLE_SECS: u64 = 10;

/// Settings as supplied: command line / environment, or a JSON file.
/// Every field is optional here; `RestoreConfig::resolve` decides what is required.
#[derive(Debug, Clone, Default, Deserialize, Args)]
#[serde(default)]
pub struct RawConfig {
    /// Identifier of the instance being replaced
    #[arg(long, env = "SOURCE_DB")]
    pub source_db: Option<String>,

    /// Snapshot name or ARN to restore from
    #[arg(long, env = "SNAPSHOT_ID")]
    pub snapshot_id: Option<String>,

    /// KMS key for re-encrypting a copy of the snapshot before restoring
    #[arg(long, env = "KMS_KEY_ARN")]
    pub kms_key_arn: Option<String>,

    /// AWS region override (defaults to the SDK provider chain)
    #[arg(long, env = "RDS_REGION")]
    pub region: Option<String>,

    #[arg(long, env = "WAIT_TIMEOUT_SECS")]
    pub wait_timeout_secs: Option<u64>,

    #[arg(long, env = "WAIT_POLL_INTERVAL_SECS")]
    pub wait_poll_interval_secs: Option<u64>,

    #[arg(long, env = "RENAME_TIMEOUT_SECS")]
    pub rename_timeout_secs: Option<u64>,

    #[arg(long, env = "RENAME_POLL_INTERVAL_SECS")]
    pub rename_poll_interval_secs: Option<u64>,

    /// Delay between disabling deletion protection and deleting
    #[arg(long, env = "DELETION_PROTECTION_SETTLE_SECS")]
    pub protection_settle_secs: Option<u64>,

    /// Return success without restoring when the source already carries the
    /// marker of SNAPSHOT_ID (default: restore again)
    #[arg(long, env = "SKIP_IF_ALREADY_RESTORED")]
    pub skip_if_already_restored: Option<bool>,
}

impl RawConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: RawConfig) -> RawConfig {
        RawConfig {
            source_db: non_empty(self.source_db).or(non_empty(fallback.source_db)),
            snapshot_id: non_empty(self.snapshot_id).or(non_empty(fallback.snapshot_id)),
            kms_key_arn: non_empty(self.kms_key_arn).or(non_empty(fallback.kms_key_arn)),
            region: non_empty(self.region).or(non_empty(fallback.region)),
            wait_timeout_secs: self.wait_timeout_secs.or(fallback.wait_timeout_secs),
            wait_poll_interval_secs: self
                .wait_poll_interval_secs
                .or(fallback.wait_poll_interval_secs),
            rename_timeout_secs: self.rename_timeout_secs.or(fallback.rename_timeout_secs),
            rename_poll_interval_secs: self
                .rename_poll_interval_secs
                .or(fallback.rename_poll_interval_secs),
            protection_settle_secs: self
                .protection_settle_secs
                .or(fallback.protection_settle_secs),
            skip_if_already_restored: self
                .skip_if_already_restored
                .or(fallback.skip_if_already_restored),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated settings for one restore invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreConfig {
    pub source_db: String,
    pub restored_db: String,
    pub snapshot_id: Option<String>,
    pub kms_key_arn: Option<String>,
    /// Snapshot copy, restore and delete waits
    pub wait: WaitConfig,
    /// Post-rename poll
    pub rename_wait: WaitConfig,
    pub protection_settle: Duration,
    pub skip_if_already_restored: bool,
}

impl RestoreConfig {
    pub fn resolve(raw: &RawConfig) -> Result<Self, AppError> {
        let source_db = non_empty(raw.source_db.clone()).ok_or_else(|| {
            AppError::Config("SOURCE_DB environment variable is not set or empty".to_string())
        })?;

        let wait = wait_config(
            raw.wait_poll_interval_secs
                .unwrap_or(DEFAULT_WAIT_POLL_INTERVAL_SECS),
            raw.wait_timeout_secs.unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS),
            "WAIT_POLL_INTERVAL_SECS",
        )?;
        let rename_wait = wait_config(
            raw.rename_poll_interval_secs
                .unwrap_or(DEFAULT_RENAME_POLL_INTERVAL_SECS),
            raw.rename_timeout_secs
                .unwrap_or(DEFAULT_RENAME_TIMEOUT_SECS),
            "RENAME_POLL_INTERVAL_SECS",
        )?;

        Ok(RestoreConfig {
            restored_db: restored_instance_id(&source_db),
            source_db,
            snapshot_id: non_empty(raw.snapshot_id.clone()),
            kms_key_arn: non_empty(raw.kms_key_arn.clone()),
            wait,
            rename_wait,
            protection_settle: Duration::from_secs(
                raw.protection_settle_secs
                    .unwrap_or(DEFAULT_PROTECTION_SETTLE_SECS),
            ),
            skip_if_already_restored: raw.skip_if_already_restored.unwrap_or(false),
        })
    }
}

fn wait_config(interval_secs: u64, timeout_secs: u64, name: &str) -> Result<WaitConfig, AppError> {
    if interval_secs == 0 {
        return Err(AppError::Config(format!("{} must be greater than zero", name)));
    }
    Ok(WaitConfig {
        interval: Duration::from_secs(interval_secs),
        timeout: Duration::from_secs(timeout_secs),
    })
}
