//! RDS In-Place Restore Tool
//!
//! Restores a snapshot next to a database instance, deletes the original and
//! renames the restored instance to the original's identifier. Runs as a
//! Lambda function or once from the command line.

// rdsrestore/src/main.rs
mod config;
mod errors;
mod invocation;
mod rds;
mod restore;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::RawConfig;
use rds::RdsClient;

/// Set by the Lambda execution environment
const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

/// sysexits EX_TEMPFAIL: the restore is in flight, run again later
const EXIT_RETRY_LATER: u8 = 75;

/// Replace an RDS instance with a restore of a snapshot, keeping its identifier
#[derive(Parser, Debug)]
#[command(name = "rdsrestore")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: RawConfig,

    /// JSON file with the same keys as the flags; flags and environment take precedence
    #[arg(short, long, env = "RESTORE_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Event payload for a one-shot run (logged, not interpreted)
    #[arg(long, default_value = "{}")]
    event: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let lambda = std::env::var_os(LAMBDA_RUNTIME_ENV).is_some();
    init_logging(cli.verbose, lambda);

    match run_app(cli, lambda).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, lambda: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if lambda {
        // CloudWatch stamps every line itself
        builder.json().without_time().init();
    } else {
        builder.init();
    }
}

async fn run_app(cli: Cli, lambda: bool) -> Result<ExitCode> {
    let Cli {
        settings,
        config,
        event,
        ..
    } = cli;

    let raw = match config {
        Some(path) => settings.or(RawConfig::load_from_json(&path)?),
        None => settings,
    };
    let rds = RdsClient::from_env(raw.region.as_deref()).await;

    if lambda {
        run_lambda(rds, raw).await?;
        Ok(ExitCode::SUCCESS)
    } else {
        run_once(&rds, &raw, &event).await
    }
}

async fn run_lambda(rds: RdsClient, raw: RawConfig) -> Result<()> {
    info!("Starting Lambda runtime");
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let rds = rds.clone();
        let raw = raw.clone();
        async move {
            let (cancel, timer) = invocation::cancel_before_deadline(
                event.context.deadline,
                invocation::DEADLINE_MARGIN,
            );
            let result = invocation::handle_event(&rds, &raw, &event.payload, &cancel).await;
            timer.abort();
            Ok::<_, lambda_runtime::Error>(result)
        }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
    .context("Lambda runtime stopped")
}

async fn run_once(rds: &RdsClient, raw: &RawConfig, event: &str) -> Result<ExitCode> {
    let payload: Value = serde_json::from_str(event).context("--event must be valid JSON")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result = invocation::handle_event(rds, raw, &payload, &cancel).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    );

    Ok(match result.status_code {
        200 | 404 => ExitCode::SUCCESS,
        202 => ExitCode::from(EXIT_RETRY_LATER),
        _ => ExitCode::FAILURE,
    })
}
