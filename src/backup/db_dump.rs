// mongobackup/src/backup/db_dump.rs
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{BackupConfig, BackupPaths, Credentials};
use crate::utils::process::ProcessRunner;

pub const MONGODUMP: &str = "mongodump";

/// Builds the mongodump argument list for this run.
///
/// Credentials come either from the connection URI alone or from the discrete
/// host/port/db/username/password settings, never a mix. Output goes either to a
/// gzip archive stream at the archive path or to the dump directory.
/// `EXTRA_OPTIONS` is split with shell quoting rules and appended last.
pub fn build_dump_args(config: &BackupConfig, paths: &BackupPaths) -> Result<Vec<String>> {
    let mut args = Vec::new();

    let Some(credentials) = &config.credentials else {
        anyhow::bail!("Either MONGO_URI or HOST must be set to locate the database to back up");
    };
    match credentials {
        Credentials::Uri(uri) => {
            args.push("--uri".to_string());
            args.push(uri.clone());
        }
        Credentials::Discrete {
            host,
            port,
            db,
            username,
            password,
        } => {
            args.push("--host".to_string());
            args.push(host.clone());
            let optional = [
                ("--port", port),
                ("--db", db),
                ("--username", username),
                ("--password", password),
            ];
            for (flag, value) in optional {
                if let Some(value) = value {
                    args.push(flag.to_string());
                    args.push(value.clone());
                }
            }
        }
    }

    match &config.collection {
        Some(collection) => {
            args.push("--collection".to_string());
            args.push(collection.clone());
            if !config.exclude_collections.is_empty() {
                warn!(
                    "COLLECTION is set, ignoring EXCLUDE_COLLECTIONS {:?}",
                    config.exclude_collections
                );
            }
        }
        None => {
            for excluded in &config.exclude_collections {
                args.push("--excludeCollection".to_string());
                args.push(excluded.clone());
            }
        }
    }

    if config.archive {
        args.push(format!("--archive={}", paths.archive_file_path.display()));
        args.push("--gzip".to_string());
    } else {
        args.push(format!("--out={}", paths.dump_dir_path.display()));
    }

    if let Some(extra) = &config.extra_options {
        let extra_args = shlex::split(extra)
            .with_context(|| format!("EXTRA_OPTIONS has unbalanced quotes: {}", extra))?;
        args.extend(extra_args);
    }
    Ok(args)
}

/// Dumps the configured database with mongodump.
pub fn dump_database<R: ProcessRunner>(
    config: &BackupConfig,
    paths: &BackupPaths,
    runner: &R,
) -> Result<()> {
    if config.archive {
        info!(
            "Dumping database to archive {}",
            paths.archive_file_path.display()
        );
    } else {
        info!("Dumping database to directory {}", paths.dump_dir_path.display());
    }

    let args = build_dump_args(config, paths)?;
    runner
        .run(MONGODUMP, &args)
        .with_context(|| format!("{} did not complete", MONGODUMP))?;

    info!("✓ Database dump finished");
    Ok(())
}
