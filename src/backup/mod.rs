pub(crate) mod archive;
pub(crate) mod db_dump;
mod logic;
pub(crate) mod retention;
pub(crate) mod s3_upload;

pub use logic::RunOutcome;

use crate::config::{BackupConfig, BackupPaths};
use crate::errors::BackupError;
use crate::utils::process::SystemRunner;
use s3_upload::S3Store;

/// Public entry point for the backup process.
/// Wires the real process runner and S3 client into the orchestration.
pub async fn run_backup_flow(
    config: &BackupConfig,
    paths: &BackupPaths,
) -> Result<RunOutcome, BackupError> {
    let store = S3Store::new(&config.aws);
    logic::perform_backup_orchestration(config, paths, &SystemRunner, &store).await
}
