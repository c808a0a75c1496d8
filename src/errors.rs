use std::path::PathBuf;
use thiserror::Error;

/// Failure of one step of a backup run. The first one raised ends the run.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Dump failed: {0:#}")]
    Dump(anyhow::Error),

    #[error("Archive creation failed: {0:#}")]
    Archive(anyhow::Error),

    #[error("Upload failed: {0:#}")]
    Upload(anyhow::Error),

    #[error("Retention pruning failed: {0}")]
    Retention(#[from] RetentionError),

    #[error("Notification failed: {0:#}")]
    Notification(anyhow::Error),
}

#[derive(Error, Debug)]
pub enum RetentionError {
    /// Archive name does not end in a `<timestamp>.zip` segment.
    #[error("Cannot read backup timestamp from archive name: {name}")]
    UnparseableName { name: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl RetentionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RetentionError::Io {
            path: path.into(),
            source,
        }
    }
}
