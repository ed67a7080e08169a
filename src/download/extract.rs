//! Archive extraction for downloaded tools
//!
//! Handles `.tar.gz` and `.zip` archives, either pulling a single named entry
//! or unpacking the whole archive into a directory.

use flate2::read::GzDecoder;
use log::debug;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

use super::spec::ArchiveKind;
use crate::error::{FetchError, Result};

/// Mark a file executable (0755); no-op off Unix
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

fn normalize_entry(name: &str) -> &str {
    let name = name.trim_start_matches("./");
    name.trim_start_matches('/')
}

fn archive_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract a downloaded archive into place
///
/// With `entry`, only that file is written to `destination` (a file path) and
/// made executable. Without, the archive is unpacked into `destination` (a
/// directory) through a temporary sibling directory.
pub async fn extract_archive(
    archive_path: &Path,
    kind: ArchiveKind,
    entry: Option<&str>,
    destination: &Path,
) -> Result<PathBuf> {
    let archive_path = archive_path.to_path_buf();
    let entry = entry.map(str::to_string);
    let destination = destination.to_path_buf();

    // Archive decoding is CPU-bound
    tokio::task::spawn_blocking(move || match (kind, entry) {
        (ArchiveKind::TarGz, Some(entry)) => extract_tar_gz_entry(&archive_path, &entry, &destination),
        (ArchiveKind::Zip, Some(entry)) => extract_zip_entry(&archive_path, &entry, &destination),
        (ArchiveKind::TarGz | ArchiveKind::Zip, None) => {
            extract_all(&archive_path, kind, &destination)
        }
        (ArchiveKind::None, _) => Err(FetchError::extraction(
            archive_label(&archive_path),
            "",
            "not an archive",
        )),
    })
    .await
    .map_err(|e| FetchError::Io(std::io::Error::other(e)))?
}

fn write_entry(reader: &mut impl std::io::Read, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = File::create(destination)?;
    std::io::copy(reader, &mut out)?;
    out.sync_all()?;
    set_executable(destination)?;
    Ok(())
}

/// Extract a single entry from a .tar.gz archive
pub fn extract_tar_gz_entry(archive_path: &Path, entry: &str, destination: &Path) -> Result<PathBuf> {
    let label = archive_label(archive_path);
    let wanted = normalize_entry(entry);
    let mut seen = Vec::new();

    let mut archive = Archive::new(GzDecoder::new(File::open(archive_path)?));
    let entries = archive
        .entries()
        .map_err(|e| FetchError::extraction(&label, entry, e.to_string()))?;

    for item in entries {
        let mut item = item.map_err(|e| FetchError::extraction(&label, entry, e.to_string()))?;
        let path = item
            .path()
            .map_err(|e| FetchError::extraction(&label, entry, e.to_string()))?
            .to_string_lossy()
            .into_owned();

        if normalize_entry(&path) == wanted && item.header().entry_type().is_file() {
            write_entry(&mut item, destination)?;
            debug!("Extracted {} from {} to {}", entry, label, destination.display());
            return Ok(destination.to_path_buf());
        }
        seen.push(path);
    }

    Err(FetchError::extraction(
        label,
        entry,
        format!("entry not found; archive contains: {}", seen.join(", ")),
    ))
}

/// Extract a single entry from a .zip archive
pub fn extract_zip_entry(archive_path: &Path, entry: &str, destination: &Path) -> Result<PathBuf> {
    let label = archive_label(archive_path);
    let wanted = normalize_entry(entry);

    let mut archive = ZipArchive::new(File::open(archive_path)?)
        .map_err(|e| FetchError::extraction(&label, entry, e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| FetchError::extraction(&label, entry, e.to_string()))?;

        if !file.is_dir() && normalize_entry(file.name()) == wanted {
            write_entry(&mut file, destination)?;
            debug!("Extracted {} from {} to {}", entry, label, destination.display());
            return Ok(destination.to_path_buf());
        }
    }

    let names = archive.file_names().collect::<Vec<_>>().join(", ");
    Err(FetchError::extraction(
        label,
        entry,
        format!("entry not found; archive contains: {}", names),
    ))
}

/// Unpack a whole archive into `destination`, replacing it only on success
pub fn extract_all(archive_path: &Path, kind: ArchiveKind, destination: &Path) -> Result<PathBuf> {
    let label = archive_label(archive_path);
    let dir_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extract".to_string());
    let temp_dir = destination.with_file_name(format!(".{}.tmp", dir_name));

    // Leftovers from an earlier interrupted run
    if temp_dir.exists() {
        std::fs::remove_dir_all(&temp_dir)?;
    }
    std::fs::create_dir_all(&temp_dir)?;

    let unpacked = match kind {
        ArchiveKind::TarGz => Archive::new(GzDecoder::new(File::open(archive_path)?))
            .unpack(&temp_dir)
            .map_err(|e| FetchError::extraction(&label, "*", e.to_string())),
        ArchiveKind::Zip => ZipArchive::new(File::open(archive_path)?)
            .and_then(|mut archive| archive.extract(&temp_dir))
            .map_err(|e| FetchError::extraction(&label, "*", e.to_string())),
        ArchiveKind::None => Err(FetchError::extraction(&label, "*", "not an archive")),
    };

    if let Err(e) = unpacked {
        let _ = std::fs::remove_dir_all(&temp_dir);
        return Err(e);
    }

    if destination.exists() {
        std::fs::remove_dir_all(destination)?;
    }
    std::fs::rename(&temp_dir, destination)?;

    debug!("Unpacked {} into {}", label, destination.display());
    Ok(destination.to_path_buf())
}
