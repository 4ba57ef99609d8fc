//! Storage Resolver
//!
//! Decides where a validated upload lands. Managed uploads become
//! catalog records with derived renditions; direct uploads become bare
//! paths on a named disk with no catalog involvement. A database failure
//! after bytes hit the disk removes those bytes again, so a failed
//! managed upload leaves no orphan files.

use chrono::Utc;
use mm_common::{FileInfo, MediaSummary};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::models::{MediaRecord, NewMedia};
use crate::db::queries;
use crate::error::MediaError;
use crate::media::processing::{self, ImageProcessingResult};
use crate::media::ValidatedUpload;
use crate::permissions::Caller;

use super::disk::DiskRegistry;
use super::path_guard;

/// What an upload resolved to: either a catalog id or a bare disk path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredReference {
    /// Managed catalog record.
    Media(Uuid),
    /// Direct disk-relative path.
    Path(String),
}

impl StoredReference {
    #[must_use]
    pub const fn as_media_id(&self) -> Option<Uuid> {
        match self {
            Self::Media(id) => Some(*id),
            Self::Path(_) => None,
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Media(_) => None,
            Self::Path(path) => Some(path),
        }
    }
}

/// Store a validated upload as a managed catalog record.
///
/// Images get a blurhash, a thumbnail, and a full-size WebP re-encode;
/// when the re-encode is strictly smaller than the original it becomes
/// the stored file, and `path`/`mime_type`/`extension` describe what is
/// actually on disk while `file_name` keeps the original. Processing
/// failures degrade to storing the original bytes without renditions.
pub async fn store_managed(
    pool: &SqlitePool,
    disks: &DiskRegistry,
    caller: &Caller,
    disk_name: &str,
    display_name: Option<String>,
    upload: ValidatedUpload,
) -> Result<MediaRecord, MediaError> {
    let disk = disks.get(disk_name)?;

    let processed = if upload.is_image() {
        run_processing(&upload).await
    } else {
        None
    };

    let file_id = Uuid::now_v7();
    let prefix = format!("{}/{}", Utc::now().format("%Y/%m"), file_id.simple());
    let original_size = i64::try_from(upload.data.len()).unwrap_or(i64::MAX);

    // The optimized rendition, when it exists, replaces the original as
    // the stored file.
    let (stored_bytes, stored_mime, stored_ext, optimized_size) = match processed
        .as_ref()
        .and_then(|p| p.optimized.as_ref())
    {
        Some(optimized) => (
            optimized.data.as_slice(),
            optimized.content_type.clone(),
            "webp".to_string(),
            Some(i64::try_from(optimized.data.len()).unwrap_or(i64::MAX)),
        ),
        None => (
            upload.data.as_slice(),
            upload.mime_type.clone(),
            upload.extension.clone(),
            None,
        ),
    };

    let path = format!("{prefix}.{stored_ext}");
    disk.write(&path, stored_bytes).await?;

    let thumbnail_path = match processed.as_ref().and_then(|p| p.thumbnail.as_ref()) {
        Some(thumb) => {
            let thumb_path = format!("{prefix}_thumb.webp");
            match disk.write(&thumb_path, &thumb.data).await {
                Ok(()) => Some(thumb_path),
                Err(e) => {
                    // A missing thumbnail degrades the listing, not the upload
                    warn!(path = %path, error = %e, "Thumbnail write failed");
                    None
                }
            }
        }
        None => None,
    };

    let (width, height) = processed.as_ref().map_or(
        (
            upload.width.map(i64::from),
            upload.height.map(i64::from),
        ),
        |p| (Some(i64::from(p.width)), Some(i64::from(p.height))),
    );

    let name = display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| file_stem(&upload.file_name));

    let new = NewMedia {
        name,
        file_name: upload.file_name,
        disk: disk_name.to_string(),
        path: path.clone(),
        thumbnail_path: thumbnail_path.clone(),
        mime_type: stored_mime,
        extension: stored_ext,
        size_bytes: original_size,
        optimized_size_bytes: optimized_size,
        width,
        height,
        blurhash: processed.map(|p| p.blurhash),
        owner_id: Some(caller.id),
        branch_id: caller.branch_id,
    };

    match queries::create_media(pool, &new).await {
        Ok(record) => Ok(record),
        Err(e) => {
            // No record means no file: undo the writes before failing
            if let Err(cleanup) = disk.delete(&path).await {
                warn!(path = %path, error = %cleanup, "Orphan cleanup failed");
            }
            if let Some(thumb_path) = &thumbnail_path {
                if let Err(cleanup) = disk.delete(thumb_path).await {
                    warn!(path = %thumb_path, error = %cleanup, "Orphan cleanup failed");
                }
            }
            Err(MediaError::Database(e))
        }
    }
}

/// Store a validated upload as a bare file under a directory on a named
/// disk. No catalog record is created; the returned path plus probed
/// [`FileInfo`] is all the caller gets.
///
/// Name collisions are resolved by suffixing, never by overwriting.
pub async fn store_direct(
    disks: &DiskRegistry,
    disk_name: &str,
    root: &str,
    upload: &ValidatedUpload,
) -> Result<(String, FileInfo), MediaError> {
    path_guard::ensure_safe(root)?;
    let disk = disks.get(disk_name)?;

    let mut path = join_under(root, &upload.file_name);
    if disk.exists(&path).await? {
        let stem = file_stem(&upload.file_name);
        let suffix: String = Uuid::now_v7().simple().to_string()[..8].to_string();
        path = join_under(root, &format!("{stem}-{suffix}.{}", upload.extension));
    }

    disk.write(&path, &upload.data).await?;
    let info = disk.file_info(&path).await?;
    Ok((path, info))
}

/// Build the caller-facing DTO for a record, resolving the thumbnail URL
/// against the disk registry. A record on a no-longer-configured disk
/// just loses its thumbnail URL.
#[must_use]
pub fn summarize(disks: &DiskRegistry, record: MediaRecord) -> MediaSummary {
    let thumbnail_url = record
        .thumbnail_path
        .as_ref()
        .and_then(|p| disks.get(&record.disk).ok().map(|d| d.url(p)));
    record.into_summary(thumbnail_url)
}

/// Run image processing off the async runtime, degrading to `None` on
/// any failure.
async fn run_processing(upload: &ValidatedUpload) -> Option<ImageProcessingResult> {
    let data = upload.data.clone();
    let mime = upload.mime_type.clone();
    match tokio::task::spawn_blocking(move || processing::process_image(&data, &mime)).await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => {
            warn!(mime_type = %upload.mime_type, error = %e, "Image processing failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "Image processing task panicked");
            None
        }
    }
}

fn join_under(root: &str, file_name: &str) -> String {
    if root.is_empty() {
        file_name.to_string()
    } else {
        format!("{root}/{file_name}")
    }
}

fn file_stem(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}
