// mongobackup/src/backup/logic.rs
use std::fmt;
use tracing::{error, info};

use super::{archive, db_dump, retention, s3_upload};
use crate::backup::s3_upload::ObjectStore;
use crate::config::{BackupConfig, BackupPaths, Credentials};
use crate::errors::BackupError;
use crate::notify::{Notification, Notifier};
use crate::utils::process::ProcessRunner;

/// Steps of a run, in order. Any failure jumps to `NotifyingFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dumping,
    Archiving,
    Uploading,
    Pruning,
    NotifyingSuccess,
    NotifyingFailure,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Dumping => "dumping",
            Stage::Archiving => "archiving",
            Stage::Uploading => "uploading",
            Stage::Pruning => "pruning",
            Stage::NotifyingSuccess => "notifying success",
            Stage::NotifyingFailure => "notifying failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed { message: String },
    /// The run failed and the failure notification path ran.
    Failed { error: BackupError },
}

/// Runs one backup: dump, pack, upload, prune, notify.
///
/// Step failures are reported through the failure notification and returned as
/// [`RunOutcome::Failed`]. Only a failure of that notification itself is an `Err`.
pub async fn perform_backup_orchestration<R, S>(
    config: &BackupConfig,
    paths: &BackupPaths,
    runner: &R,
    store: &S,
) -> Result<RunOutcome, BackupError>
where
    R: ProcessRunner,
    S: ObjectStore,
{
    let notifier = Notifier::new(config, runner);

    let result = match run_backup_steps(config, paths, runner, store).await {
        Ok(()) => notify_success(config, paths, &notifier),
        Err(e) => Err(e),
    };

    match result {
        Ok(message) => Ok(RunOutcome::Completed { message }),
        Err(error) => {
            error!("❌ {}", error);
            info!("▶ {}", Stage::NotifyingFailure);
            notifier
                .send(&Notification::failure(&paths.backup_name, &error))
                .map_err(BackupError::Notification)?;
            Ok(RunOutcome::Failed { error })
        }
    }
}

async fn run_backup_steps<R, S>(
    config: &BackupConfig,
    paths: &BackupPaths,
    runner: &R,
    store: &S,
) -> Result<(), BackupError>
where
    R: ProcessRunner,
    S: ObjectStore,
{
    info!("▶ {}", Stage::Dumping);
    db_dump::dump_database(config, paths, runner).map_err(BackupError::Dump)?;

    if config.archive {
        info!("ARCHIVE set, mongodump wrote a compressed archive, skipping packing");
    } else {
        info!("▶ {}", Stage::Archiving);
        archive::create_archive(
            &paths.dump_dir_path,
            &paths.archive_file_path,
            &paths.archive_file_name,
        )
        .map_err(BackupError::Archive)?;
    }

    info!("▶ {}", Stage::Uploading);
    s3_upload::upload_backup(store, config.storage.as_ref(), &paths.archive_file_path)
        .await
        .map_err(BackupError::Upload)?;

    info!("▶ {}", Stage::Pruning);
    let report = retention::prune_local_backups(&paths.folder, config.keep_local_backups)?;
    if !report.expired.is_empty() {
        info!("✓ Removed {} old local backups", report.expired.len());
    }

    match (&config.storage, config.keep_remote_backups) {
        (Some(destination), Some(keep)) => {
            let removed = retention::prune_remote_backups(store, destination, keep).await?;
            if !removed.is_empty() {
                info!("✓ Removed {} old remote backups", removed.len());
            }
        }
        (None, Some(_)) => {
            info!("KEEP_REMOTE_BACKUPS_COUNT set without AWS_BUCKET, skipping remote pruning")
        }
        _ => {}
    }
    Ok(())
}

fn notify_success<R: ProcessRunner>(
    config: &BackupConfig,
    paths: &BackupPaths,
    notifier: &Notifier<'_, R>,
) -> Result<String, BackupError> {
    let source = config
        .credentials
        .as_ref()
        .map(Credentials::source_identifier)
        .unwrap_or_default();
    let message = format!("Backup of {} completed and uploaded.", source);
    if config.email_only_on_error {
        info!("EMAIL_ONLY_ON_ERROR set, skipping success email");
    } else {
        info!("▶ {}", Stage::NotifyingSuccess);
        notifier
            .send(&Notification::success(&paths.backup_name, &message))
            .map_err(BackupError::Notification)?;
    }
    Ok(message)
}
