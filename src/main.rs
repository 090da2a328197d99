use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use sftp_to_s3::cli::{Args, Commands};
use sftp_to_s3::cloud::resolver::ConfigConnectionResolver;
use sftp_to_s3::config::{load_connections, ConnectionsConfig};
use sftp_to_s3::models::TransferOutcome;
use sftp_to_s3::security::safe_error_message;
use sftp_to_s3::transfer::run_transfer;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    let request = args.transfer_request()?;
    let connections = load_connections(Some(args.connections.as_path()))?;
    let resolver = ConfigConnectionResolver::new(connections);

    info!(
        "Transferring {} ({}) to s3://{}/{} ({})",
        request.sftp_path(),
        request.sftp_conn_id(),
        request.s3_bucket(),
        request.s3_key(),
        request.s3_conn_id()
    );

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let outcome = runtime
        .block_on(run_transfer(request, &resolver))
        .map_err(|e| anyhow!(safe_error_message("Transfer failed", &e)))?;

    if let TransferOutcome::Skipped { sftp_path } = &outcome {
        info!("Nothing uploaded: {} does not exist", sftp_path);
    }

    if let Some(path) = &args.report {
        write_report(path, &outcome)?;
    }

    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            if path.exists() {
                return Err(anyhow!("{} already exists, not overwriting", path.display()));
            }
            info!("Creating sample connections file at {}", path.display());
            ConnectionsConfig::create_sample_config_file(path)?;
            info!("Connections file created successfully");
            Ok(())
        }
    }
}

/// Write the outcome as pretty JSON
fn write_report(path: &Path, outcome: &TransferOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)
        .context("Failed to serialize transfer report")?;
    fs::write(path, json)
        .context(format!("Failed to write transfer report to {}", path.display()))?;
    info!("Transfer report written to {}", path.display());
    Ok(())
}
