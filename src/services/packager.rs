//! Bundles the photos and video of a progress update into one ZIP archive
//! and places it in object storage.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::config::UploadConfig;
use crate::models::AttachmentBundle;
use crate::storage::{ObjectStorage, StorageError};

pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("Max {max} photos allowed, received {received}")]
    TooManyPhotos { max: usize, received: usize },

    #[error("Max {max} video allowed, received {received}")]
    TooManyVideos { max: usize, received: usize },

    #[error("ZIP exceeds {}MB limit", mib(.limit))]
    TooLarge { size: usize, limit: usize },

    #[error("Failed to build archive: {0}")]
    Archive(#[from] ZipError),

    #[error("Failed to stage archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to upload archive: {0}")]
    Storage(#[from] StorageError),

    #[error("Archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn mib(bytes: &usize) -> usize {
    bytes / (1024 * 1024)
}

/// One uploaded file, held in memory.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    pub photos: Vec<Attachment>,
    pub videos: Vec<Attachment>,
}

impl AttachmentSet {
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty() && self.videos.is_empty()
    }
}

pub struct Packager {
    storage: Arc<dyn ObjectStorage>,
    limits: UploadConfig,
}

impl Packager {
    pub fn new(storage: Arc<dyn ObjectStorage>, limits: UploadConfig) -> Self {
        Self { storage, limits }
    }

    /// Checks attachment counts without touching the content.
    pub fn check_counts(&self, photos: usize, videos: usize) -> Result<(), PackagingError> {
        if photos > self.limits.max_photos {
            return Err(PackagingError::TooManyPhotos {
                max: self.limits.max_photos,
                received: photos,
            });
        }
        if videos > self.limits.max_videos {
            return Err(PackagingError::TooManyVideos {
                max: self.limits.max_videos,
                received: videos,
            });
        }
        Ok(())
    }

    /// Zips every attachment, uploads the archive and describes where it went.
    ///
    /// Returns `Ok(None)` when there is nothing to package. The staged archive
    /// is removed whether or not the upload succeeds.
    pub async fn package(
        &self,
        files: AttachmentSet,
        date: &str,
    ) -> Result<Option<AttachmentBundle>, PackagingError> {
        self.check_counts(files.photos.len(), files.videos.len())?;
        if files.is_empty() {
            return Ok(None);
        }

        let filename = archive_filename(date);
        let entries: Vec<Attachment> = files.photos.into_iter().chain(files.videos).collect();
        let entry_count = entries.len();

        let archive = tokio::task::spawn_blocking(move || build_archive(entries)).await??;
        if archive.len() > self.limits.max_archive_bytes {
            return Err(PackagingError::TooLarge {
                size: archive.len(),
                limit: self.limits.max_archive_bytes,
            });
        }

        let staging = tempfile::tempdir()?;
        let path = staging.path().join(&filename);
        tokio::fs::write(&path, &archive).await?;

        let uploaded = self.storage.upload(&path, &filename, ARCHIVE_MIME_TYPE, None).await;
        if let Err(e) = staging.close() {
            tracing::warn!("Failed to remove staged archive {}: {}", path.display(), e);
        }
        let object = uploaded?;

        tracing::info!(
            "Packaged {} attachments into {} ({} bytes)",
            entry_count,
            filename,
            archive.len()
        );

        Ok(Some(AttachmentBundle {
            drive_id: object.id,
            url: object.locator,
            mime_type: ARCHIVE_MIME_TYPE.to_string(),
            filename,
            uploaded_at: Utc::now(),
        }))
    }
}

/// `progress_<date>.zip`, with every `:` replaced so the name is portable.
pub fn archive_filename(date: &str) -> String {
    format!("progress_{}.zip", date.trim().replace(':', "-"))
}

/// Writes every attachment into an in-memory ZIP at maximum deflate compression.
pub fn build_archive(entries: Vec<Attachment>) -> Result<Vec<u8>, ZipError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used = HashSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry_name(&entry.filename, index, &mut used);
        writer.start_file(name, options)?;
        writer.write_all(&entry.bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Base name of the upload, made unique within the archive.
fn entry_name(original: &str, index: usize, used: &mut HashSet<String>) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment-{}", index + 1));

    if used.insert(base.clone()) {
        return base;
    }

    let (stem, ext) = match base.rfind('.') {
        Some(dot) if dot > 0 => (&base[..dot], &base[dot..]),
        _ => (base.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
