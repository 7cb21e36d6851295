//! Archive extraction
//!
//! Unpacks uploaded `.zip`, `.tar` and `.tar.zst` archives into a job workspace.
//! Entries that would land outside the destination are skipped.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::errors::DeployError;

/// Accepted archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarZst,
}

impl ArchiveFormat {
    /// Determine the format from the declared file name, then the declared content type
    pub fn detect(name: &str, content_type: Option<&str>) -> Result<Self, DeployError> {
        let lower = name.trim().to_lowercase();
        if lower.ends_with(".zip") {
            return Ok(ArchiveFormat::Zip);
        }
        if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            return Ok(ArchiveFormat::TarZst);
        }
        if lower.ends_with(".tar") {
            return Ok(ArchiveFormat::Tar);
        }

        let mime = content_type
            .map(|c| c.split(';').next().unwrap_or("").trim().to_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            "application/zip" | "application/x-zip-compressed" => Ok(ArchiveFormat::Zip),
            "application/x-tar" => Ok(ArchiveFormat::Tar),
            "application/zstd" | "application/x-zstd" => Ok(ArchiveFormat::TarZst),
            _ => Err(DeployError::InvalidInput(format!(
                "Unsupported archive '{}': expected .zip, .tar, .tar.zst or .tzst",
                name
            ))),
        }
    }
}

/// Outcome of an extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Number of regular files written
    pub files: usize,

    /// Entry names that were not extracted
    pub skipped: Vec<String>,
}

/// Extract `data` into `dest`, creating it if needed.
///
/// Fails with `EmptyArchive` when the archive holds no regular files. Corrupt
/// archives are a `SourceFetch` error.
pub async fn extract_archive(
    data: Bytes,
    format: ArchiveFormat,
    dest: &Path,
) -> Result<ExtractReport, DeployError> {
    let dest = dest.to_owned();
    let report = spawn_blocking(move || extract_sync(&data, format, &dest))
        .await
        .map_err(|e| DeployError::Internal(format!("Extraction task failed: {}", e)))??;

    if report.files == 0 {
        return Err(DeployError::EmptyArchive(
            "the archive does not contain any files".to_string(),
        ));
    }

    debug!(files = report.files, skipped = report.skipped.len(), "extracted archive");
    Ok(report)
}

fn extract_sync(data: &[u8], format: ArchiveFormat, dest: &Path) -> Result<ExtractReport, DeployError> {
    fs::create_dir_all(dest)?;

    match format {
        ArchiveFormat::Zip => extract_zip(data, dest),
        ArchiveFormat::Tar => extract_tar(Cursor::new(data), dest),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(Cursor::new(data))
                .map_err(|e| corrupt("zstd", e))?;
            extract_tar(decoder, dest)
        }
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> DeployError {
    DeployError::SourceFetch(format!("Failed to read {} archive: {}", what, err))
}

fn extract_zip(data: &[u8], dest: &Path) -> Result<ExtractReport, DeployError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(|e| corrupt("zip", e))?;
    let mut report = ExtractReport::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| corrupt("zip", e))?;
        let name = entry.name().to_string();

        let Some(relative) = entry.enclosed_name().and_then(|p| confined(&p)) else {
            if !entry.is_dir() {
                report.skipped.push(name);
            }
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out).map_err(|e| corrupt("zip", e))?;
        report.files += 1;
    }

    Ok(report)
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<ExtractReport, DeployError> {
    let mut archive = tar::Archive::new(reader);
    let mut report = ExtractReport::default();

    for entry in archive.entries().map_err(|e| corrupt("tar", e))? {
        let mut entry = entry.map_err(|e| corrupt("tar", e))?;
        let raw = entry.path().map_err(|e| corrupt("tar", e))?.into_owned();
        let name = raw.to_string_lossy().into_owned();

        let is_dir = entry.header().entry_type() == tar::EntryType::Directory;
        let Some(relative) = confined(&raw) else {
            if !is_dir {
                report.skipped.push(name);
            }
            continue;
        };
        let target = dest.join(relative);

        match entry.header().entry_type() {
            tar::EntryType::Directory => fs::create_dir_all(&target)?,
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&target).map_err(|e| corrupt("tar", e))?;
                report.files += 1;
            }
            // pax/gnu metadata records are consumed by the tar reader itself
            _ => report.skipped.push(name),
        }
    }

    Ok(report)
}

/// Relative form of `path` if it stays below the extraction root
fn confined(path: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}
