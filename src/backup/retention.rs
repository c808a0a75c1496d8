// mongobackup/src/backup/retention.rs
use chrono::NaiveDateTime;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use crate::backup::s3_upload::ObjectStore;
use crate::config::{ARCHIVE_EXTENSION, StorageDestination};
use crate::errors::RetentionError;

static ARCHIVE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d_T-]*)\.zip$").expect("archive timestamp pattern is valid")
});

/// Reads the `YYYY-MM-DDTHH_MM_SS` stamp in front of `.zip`.
pub fn parse_archive_timestamp(name: &str) -> Result<NaiveDateTime, RetentionError> {
    let unparseable = || RetentionError::UnparseableName {
        name: name.to_string(),
    };
    let stamp = ARCHIVE_TIMESTAMP
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(unparseable)?;

    NaiveDateTime::parse_from_str(&stamp.replace('_', ":"), "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| unparseable())
}

/// Picks the entries to delete so that the newest `keep` remain.
///
/// Nothing is selected while there are fewer than `keep` entries. Entries with equal
/// timestamps keep their incoming order.
pub fn select_expired<T>(mut entries: Vec<(T, NaiveDateTime)>, keep: usize) -> Vec<T> {
    if entries.len() < keep {
        return Vec::new();
    }
    entries.sort_by_key(|(_, timestamp)| *timestamp);
    let expired = entries.len() - keep;
    entries
        .into_iter()
        .take(expired)
        .map(|(entry, _)| entry)
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Number of archives found in the folder.
    pub archives: usize,
    /// Archives selected for removal, oldest first.
    pub expired: Vec<String>,
    /// Every path removed, including dump directories next to the archives.
    pub removed_paths: Vec<PathBuf>,
}

/// Deletes the oldest local archives beyond `keep`, together with every entry that
/// shares the archive's base name.
pub fn prune_local_backups(folder: &Path, keep: usize) -> Result<PruneReport, RetentionError> {
    let mut archives = list_entry_names(folder, true)?
        .into_iter()
        .filter(|name| name.ends_with(ARCHIVE_EXTENSION))
        .collect::<Vec<_>>();
    archives.sort();

    let mut dated = Vec::with_capacity(archives.len());
    for name in archives {
        let timestamp = parse_archive_timestamp(&name)?;
        dated.push((name, timestamp));
    }
    let archive_count = dated.len();

    let expired = select_expired(dated, keep);
    let mut report = PruneReport {
        archives: archive_count,
        expired,
        removed_paths: Vec::new(),
    };
    if report.expired.is_empty() {
        info!(
            "{} local backups found, keeping up to {}; nothing to remove",
            archive_count, keep
        );
        return Ok(report);
    }

    info!("Removing old backups {:?}", report.expired);
    for archive in &report.expired {
        let base_name = archive.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(archive);
        for sibling in list_entry_names(folder, false)? {
            if !sibling.starts_with(base_name) {
                continue;
            }
            let path = folder.join(&sibling);
            remove_path(&path)?;
            report.removed_paths.push(path);
        }
    }
    Ok(report)
}

/// Deletes the oldest archives under the remote destination beyond `keep`.
///
/// Only `.zip` objects directly under the destination prefix are considered.
pub async fn prune_remote_backups<S: ObjectStore>(
    store: &S,
    destination: &StorageDestination,
    keep: usize,
) -> Result<Vec<String>, RetentionError> {
    let prefix = destination.list_prefix();
    let mut keys = store
        .list_keys(&destination.bucket, &prefix)
        .await
        .map_err(RetentionError::Storage)?;
    keys.retain(|key| key.ends_with(ARCHIVE_EXTENSION));
    keys.sort();

    let mut dated = Vec::with_capacity(keys.len());
    for key in keys {
        let name = key.rsplit('/').next().unwrap_or(key.as_str());
        let timestamp = parse_archive_timestamp(name)?;
        dated.push((key, timestamp));
    }
    let remote_count = dated.len();

    let expired = select_expired(dated, keep);
    if expired.is_empty() {
        info!(
            "{} remote backups in {}, keeping up to {}; nothing to remove",
            remote_count, destination, keep
        );
        return Ok(expired);
    }

    info!("Removing old remote backups {:?}", expired);
    for key in &expired {
        store
            .delete_key(&destination.bucket, key)
            .await
            .map_err(RetentionError::Storage)?;
    }
    Ok(expired)
}

fn list_entry_names(folder: &Path, files_only: bool) -> Result<Vec<String>, RetentionError> {
    let entries = fs::read_dir(folder).map_err(|e| RetentionError::io(folder, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RetentionError::io(folder, e))?;
        if files_only {
            let file_type = entry.file_type().map_err(|e| RetentionError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn remove_path(path: &Path) -> Result<(), RetentionError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| RetentionError::io(path, e))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| RetentionError::io(path, e))
}
