// rdsrestore/src/utils/naming.rs
//! Deterministic resource names.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{AppError, Result};

/// Suffix of the instance a snapshot is restored into before it takes over the source name
pub const RESTORED_SUFFIX: &str = "-restored";

/// Suffix of re-encrypted snapshot copies
pub const COPY_SUFFIX: &str = "-copy";

/// Tag written on every restored instance; its value is the snapshot it came from
pub const TAG_SOURCE_SNAPSHOT: &str = "rdsrestore:source-snapshot";

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\-]").expect("static regex"));
static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("static regex"));

pub fn restored_instance_id(source_instance_id: &str) -> String {
    format!("{}{}", source_instance_id, RESTORED_SUFFIX)
}

/// Map a snapshot name or ARN to the name of its copy.
///
/// RDS identifiers must start with a letter and contain only lowercase letters,
/// digits and single hyphens. No timestamp is involved, so every invocation
/// targets the same copy.
pub fn sanitize_snapshot_id(snapshot_id: &str) -> Result<String> {
    let last = snapshot_id.rsplit(':').next().unwrap_or(snapshot_id);
    let lowered = last.to_lowercase();
    let stripped = INVALID_CHARS.replace_all(&lowered, "");
    let collapsed = HYPHEN_RUNS.replace_all(&stripped, "-");
    let trimmed = collapsed.trim_matches('-');

    let first = trimmed.chars().next().ok_or_else(|| {
        AppError::Config(format!(
            "snapshot identifier '{}' has no characters usable in a copy name",
            snapshot_id
        ))
    })?;

    let base = if first.is_ascii_alphabetic() {
        trimmed.to_string()
    } else {
        format!("a{}", trimmed)
    };
    Ok(format!("{}{}", base, COPY_SUFFIX))
}
