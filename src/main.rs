//! MongoDB backup job
//!
//! Dumps a database with mongodump, packs and uploads the archive, prunes old
//! backups and reports the result by email.

// mongobackup/src/main.rs
mod backup;
mod config;
mod errors;
mod notify;
#[cfg(test)]
mod test_support;
mod utils;

use anyhow::{Context, Result};
use backup::RunOutcome;
use chrono::Utc;
use config::{BackupConfig, BackupPaths};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Main entry point for the backup job
#[tokio::main]
async fn main() -> ExitCode {
    // Loaded before logging so RUST_LOG may come from .env. A missing file is normal
    // in containers.
    dotenv::dotenv().ok();
    init_logging();

    match run_app().await {
        Ok(RunOutcome::Completed { message }) => {
            println!("✅ {}", message);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Failed { error }) => {
            eprintln!("❌ Backup failed: {}", error);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` from the environment (or `.env` once loaded), `info` otherwise.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();
}

async fn run_app() -> Result<RunOutcome> {
    // Optional JSON settings file as the first argument; environment wins over it.
    let config_path = env::args().nth(1).map(PathBuf::from);
    let vars = env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
    let config = BackupConfig::load(config_path.as_deref(), vars).with_context(|| {
        match &config_path {
            Some(path) => format!("Failed to load backup configuration from {}", path.display()),
            None => "Failed to load backup configuration from environment".to_string(),
        }
    })?;

    let paths = BackupPaths::resolve(&config, Utc::now());
    paths.ensure_folder()?;

    tracing::info!(
        "🚀 Starting backup {} into {}",
        paths.archive_file_name,
        paths.folder.display()
    );
    let outcome = backup::run_backup_flow(&config, &paths)
        .await
        .context("Backup failed and the failure notification could not be sent")?;
    Ok(outcome)
}
