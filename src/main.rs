//! DB Template - Main entry point.
//!
//! Runs SQL statements against one database through the transaction-aware
//! data-access layer and prints a JSON report to stdout.

use db_template::{DbError, DbResult};
use db_template::config::Config;
use db_template::db::DataSource;
use db_template::models::LogicalUnit;
use db_template::tools::ScriptRunner;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the report.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> DbResult<String> {
    let data_source = config.data_source()?;
    let source = Arc::new(DataSource::connect(&data_source).await?);
    let runner = ScriptRunner::new(Arc::clone(&source), source.db_type());

    let unit = LogicalUnit::new();
    let result = runner
        .run(&unit, &config.statements, config.transactional)
        .await;
    source.close().await;

    let reports = result?;
    serde_json::to_string_pretty(&reports)
        .map_err(|e| DbError::internal(format!("Failed to encode report: {}", e)))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    info!(
        statements = config.statements.len(),
        transactional = config.transactional,
        "Starting DB Template v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(&config).await {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.suggestion() {
                Some(suggestion) => error!(error = %e, suggestion, "Script failed"),
                None => error!(error = %e, "Script failed"),
            }
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
