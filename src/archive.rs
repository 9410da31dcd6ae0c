//! Zip packaging for finished downloads.
//!
//! Scans the working directory for fetched audio files, packs them into a
//! single `{prefix}_{unix_seconds}.zip` next to them, and deletes the
//! sources once the archive is fully written. A failed write leaves every
//! source file untouched.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::config::{ArchiveConfig, AudioFormat};
use crate::error::{Error, Result};

/// Upper bound on ` (n)` rename probes before giving up on a unique name
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Product of a successful pack
#[must_use]
#[derive(Debug, Clone)]
pub struct PackedArchive {
    /// Final archive path, inside the scanned directory
    pub path: PathBuf,

    /// Number of audio files packed
    pub entry_count: usize,
}

/// Packs fetched audio files into a timestamped zip archive.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    config: ArchiveConfig,
    format: AudioFormat,
}

impl ArchiveBuilder {
    /// Create a builder packing files of `format` per the archive config.
    pub fn new(config: ArchiveConfig, format: AudioFormat) -> Self {
        Self { config, format }
    }

    /// Pack every audio file directly inside `source_dir` into a new archive.
    ///
    /// The scan is non-recursive and matches on the configured audio
    /// extension, so the archive itself and any stray files are never
    /// picked up. Entries are stored under their base filename. An empty
    /// match set still produces a valid, empty archive.
    ///
    /// Sources are deleted only after the archive is finalized, and only
    /// when the config says so; any write failure aborts with
    /// [`Error::ArchiveWriteFailed`] and deletes nothing.
    pub async fn pack(&self, source_dir: &Path) -> Result<PackedArchive> {
        let config = self.config.clone();
        let format = self.format;
        let dir = source_dir.to_path_buf();

        // Zip writing is synchronous; keep it off the async workers.
        let packed = tokio::task::spawn_blocking(move || pack_blocking(&dir, &config, format))
            .await
            .map_err(|e| Error::ArchiveWriteFailed {
                path: source_dir.to_path_buf(),
                reason: format!("archive task panicked: {e}"),
            })??;

        tracing::info!(
            path = %packed.path.display(),
            entries = packed.entry_count,
            "archive created"
        );
        Ok(packed)
    }
}

fn pack_blocking(
    source_dir: &Path,
    config: &ArchiveConfig,
    format: AudioFormat,
) -> Result<PackedArchive> {
    let sources = collect_sources(source_dir, format.extension())?;
    let archive_path =
        unique_archive_path(source_dir, &config.name_prefix, Utc::now().timestamp())?;

    if let Err(e) = write_archive(&archive_path, &sources) {
        // A partial archive is useless; sources stay on disk for a retry.
        let _ = fs::remove_file(&archive_path);
        return Err(e);
    }

    if config.delete_sources {
        for source in &sources {
            if let Err(e) = fs::remove_file(source) {
                tracing::warn!(
                    path = %source.display(),
                    error = %e,
                    "failed to delete packed source file"
                );
            }
        }
    }

    Ok(PackedArchive {
        path: archive_path,
        entry_count: sources.len(),
    })
}

/// Collect the audio files to pack, sorted by name for stable archives.
fn collect_sources(source_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(source_dir).map_err(|e| Error::ArchiveWriteFailed {
        path: source_dir.to_path_buf(),
        reason: format!("cannot scan source directory: {e}"),
    })?;

    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::ArchiveWriteFailed {
            path: source_dir.to_path_buf(),
            reason: format!("cannot scan source directory: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Pick `{prefix}_{epoch}.zip`, appending ` (n)` before the extension when a
/// previous pack in the same second already took the name.
fn unique_archive_path(dir: &Path, prefix: &str, epoch_seconds: i64) -> Result<PathBuf> {
    let base = dir.join(format!("{prefix}_{epoch_seconds}.zip"));
    if !base.exists() {
        return Ok(base);
    }

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = dir.join(format!("{prefix}_{epoch_seconds} ({i}).zip"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::ArchiveWriteFailed {
        path: base,
        reason: format!("could not find a unique archive name after {MAX_RENAME_ATTEMPTS} attempts"),
    })
}

fn write_archive(archive_path: &Path, sources: &[PathBuf]) -> Result<()> {
    let failed = |reason: String| Error::ArchiveWriteFailed {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::create(archive_path).map_err(|e| failed(format!("create failed: {e}")))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for source in sources {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| failed(format!("non-unicode file name: {}", source.display())))?;
        writer
            .start_file(name, options)
            .map_err(|e| failed(format!("start entry {name} failed: {e}")))?;
        let mut reader = File::open(source)
            .map_err(|e| failed(format!("open {} failed: {e}", source.display())))?;
        io::copy(&mut reader, &mut writer)
            .map_err(|e| failed(format!("write entry {name} failed: {e}")))?;
    }

    writer
        .finish()
        .map_err(|e| failed(format!("finalize failed: {e}")))?;
    Ok(())
}
