// mongobackup/src/backup/archive.rs
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::info;
use walkdir::WalkDir;

/// Packs a dump directory into a single gzipped tar file.
///
/// Entries are stored under `root_name/`, so unpacking the archive recreates the
/// dump directory by name. The source directory is left untouched.
///
/// # Arguments
/// * `source_dir` - The mongodump output directory.
/// * `archive_dest_path` - Where the archive is written.
/// * `root_name` - Top-level directory name inside the archive.
pub fn create_archive(
    source_dir: &Path,
    archive_dest_path: &Path,
    root_name: &str,
) -> Result<PathBuf> {
    if !source_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Source for archival is not a directory: {}",
            source_dir.display()
        ));
    }
    if let Some(parent) = archive_dest_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create parent directory for archive: {}",
                    parent.display()
                )
            })?;
        }
    }

    info!(
        "Packing {} into {}",
        source_dir.display(),
        archive_dest_path.display()
    );

    let archive_file = File::create(archive_dest_path).with_context(|| {
        format!(
            "Failed to create archive file: {}",
            archive_dest_path.display()
        )
    })?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = Builder::new(enc);
    let root = Path::new(root_name);

    let mut file_count = 0usize;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", source_dir.display()))?;
        let path = entry.path();
        let relative = path.strip_prefix(source_dir).with_context(|| {
            format!(
                "Failed to strip prefix {} from {}",
                source_dir.display(),
                path.display()
            )
        })?;
        let name = root.join(relative);

        if entry.file_type().is_dir() {
            tar_builder.append_dir(&name, path).with_context(|| {
                format!("Failed to append directory {} to archive", path.display())
            })?;
        } else if entry.file_type().is_file() {
            tar_builder
                .append_path_with_name(path, &name)
                .with_context(|| {
                    format!(
                        "Failed to append file {} as {} to archive",
                        path.display(),
                        name.display()
                    )
                })?;
            file_count += 1;
        }
    }

    let encoder = tar_builder.into_inner().with_context(|| {
        format!(
            "Failed to finish tar stream for archive: {}",
            archive_dest_path.display()
        )
    })?;
    encoder.finish().with_context(|| {
        format!(
            "Failed to finish Gzip encoding for archive: {}",
            archive_dest_path.display()
        )
    })?;

    info!(
        "✓ Archive created at {} ({} files)",
        archive_dest_path.display(),
        file_count
    );
    Ok(archive_dest_path.to_path_buf())
}
