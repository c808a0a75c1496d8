use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

use super::BackupConfig;

const FALLBACK_BACKUP_NAME: &str = "mongodump";
const ARCHIVE_MODE_SUFFIX: &str = ".archive";
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Names and paths of the backup produced by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPaths {
    pub folder: PathBuf,
    pub backup_name: String,
    pub timestamp: String,
    /// `<backup_name>.<timestamp>`, shared by the dump directory and the archive.
    pub archive_file_name: String,
    pub dump_dir_path: PathBuf,
    pub archive_file_path: PathBuf,
}

impl BackupPaths {
    pub fn resolve(config: &BackupConfig, now: DateTime<Utc>) -> Self {
        let folder = config.local_folder.clone();
        let mut backup_name = config
            .backup_name
            .clone()
            .or_else(|| config.db.clone())
            .unwrap_or_else(|| FALLBACK_BACKUP_NAME.to_string());
        if config.archive {
            backup_name.push_str(ARCHIVE_MODE_SUFFIX);
        }
        let timestamp = format_timestamp(now);
        let archive_file_name = format!("{}.{}", backup_name, timestamp);
        let dump_dir_path = folder.join(&archive_file_name);
        let archive_file_path = folder.join(format!("{}{}", archive_file_name, ARCHIVE_EXTENSION));

        BackupPaths {
            folder,
            backup_name,
            timestamp,
            archive_file_name,
            dump_dir_path,
            archive_file_path,
        }
    }

    pub fn ensure_folder(&self) -> Result<()> {
        if !self.folder.exists() {
            fs::create_dir_all(&self.folder).with_context(|| {
                format!("Failed to create backup folder: {}", self.folder.display())
            })?;
        }
        Ok(())
    }
}

/// `YYYY-MM-DDTHH_MM_SS` in UTC; colons are not filesystem safe everywhere.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H_%M_%S").to_string()
}
