//! kbload - Main entry point

use clap::Parser;
use kbload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use kbload_ingest::{commands, Cli, Commands, RunOutcome};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // .env is optional; real variables win
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix(format!("kbload-{}", cli.command.load_name()))
        .filter_directives("sqlx=warn")
        .build();

    // Merge with environment variables (they take precedence)
    let _guard = match log_config.with_env_overrides().and_then(|cfg| init_logging(&cfg)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        },
    };

    let result = match cli.command {
        Commands::Relationships { ref run } => commands::relationships(run).await,
        Commands::StrainMarkers {
            ref run,
            reference_strain_only,
        } => commands::strain_markers(run, reference_strain_only).await,
    };

    match result {
        Ok(RunOutcome::QcOnly) => info!("QC-only run complete"),
        Ok(RunOutcome::Loaded { deleted, tables }) => {
            for (table, rows) in &tables {
                info!(table = %table, rows, "Loaded");
            }
            info!(deleted, "Load complete");
        },
        Err(e) => {
            error!(error = %e, "Load failed");
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        },
    }
}
