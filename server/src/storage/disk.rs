//! Named Disks
//!
//! Each disk is a filesystem root addressed by short name. Every path
//! that reaches the filesystem first passes the safety guard, including
//! paths the service constructed itself.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::ImageReader;
use mm_common::FileInfo;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::config::DiskDefinition;
use crate::error::MediaError;

use super::path_guard;

/// How much of a file is read when probing image dimensions. Headers of
/// the supported formats fit well within this.
const DIMENSION_PROBE_BYTES: u64 = 64 * 1024;

/// A single named filesystem root.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a disk-relative path to an absolute one, applying the
    /// safety guard. The empty path addresses the disk root.
    fn resolve(&self, path: &str) -> Result<PathBuf, MediaError> {
        path_guard::ensure_safe(path)?;
        if path.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(path))
        }
    }

    pub async fn exists(&self, path: &str) -> Result<bool, MediaError> {
        let abs = self.resolve(path)?;
        fs::try_exists(&abs)
            .await
            .map_err(|e| io_error(&self.name, "exists", path, &e))
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, MediaError> {
        let abs = self.resolve(path)?;
        match fs::read(&abs).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound),
            Err(e) => Err(io_error(&self.name, "read", path, &e)),
        }
    }

    /// Read at most `limit` bytes from the start of a file.
    pub async fn read_prefix(&self, path: &str, limit: u64) -> Result<Vec<u8>, MediaError> {
        let abs = self.resolve(path)?;
        let file = match fs::File::open(&abs).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound)
            }
            Err(e) => return Err(io_error(&self.name, "open", path, &e)),
        };
        let mut buf = Vec::new();
        file.take(limit)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| io_error(&self.name, "read", path, &e))?;
        Ok(buf)
    }

    /// Write a file, creating parent directories as needed.
    pub async fn write(&self, path: &str, data: &[u8]) -> Result<(), MediaError> {
        let abs = self.resolve(path)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&self.name, "create_dir_all", path, &e))?;
        }
        fs::write(&abs, data)
            .await
            .map_err(|e| io_error(&self.name, "write", path, &e))
    }

    /// Delete a file. Already-absent files are not an error, so cleanup
    /// paths can call this without a prior existence check.
    pub async fn delete(&self, path: &str) -> Result<(), MediaError> {
        let abs = self.resolve(path)?;
        match fs::remove_file(&abs).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.name, "delete", path, &e)),
        }
    }

    /// List regular files directly under a directory, as disk-relative
    /// paths sorted by name. A missing directory lists as empty.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>, MediaError> {
        let abs = self.resolve(dir)?;
        let mut entries = match fs::read_dir(&abs).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.name, "list", dir, &e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.name, "list", dir, &e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| io_error(&self.name, "list", dir, &e))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if dir.is_empty() {
                paths.push(file_name);
            } else {
                paths.push(format!("{dir}/{file_name}"));
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Download URL for a file on this disk.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("/api/files/{}/{path}", self.name)
    }

    /// Probe a file's metadata on demand. Image dimensions are read from
    /// a bounded prefix of the file when the extension-guessed MIME type
    /// is an image, so large files are never read whole just to probe.
    pub async fn file_info(&self, path: &str) -> Result<FileInfo, MediaError> {
        let abs = self.resolve(path)?;
        let metadata = match fs::metadata(&abs).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound)
            }
            Err(e) => return Err(io_error(&self.name, "metadata", path, &e)),
        };
        if !metadata.is_file() {
            return Err(MediaError::NotFound);
        }

        let name = path
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first()
            .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string());

        let (width, height) = if mime_type.starts_with("image/") {
            let data = self.read_prefix(path, DIMENSION_PROBE_BYTES).await?;
            ImageReader::new(Cursor::new(data))
                .with_guessed_format()
                .ok()
                .and_then(|r| r.into_dimensions().ok())
                .map_or((None, None), |(w, h)| (Some(w), Some(h)))
        } else {
            (None, None)
        };

        let last_modified = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(FileInfo {
            path: path.to_string(),
            name,
            mime_type,
            size_bytes: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            width,
            height,
            last_modified,
        })
    }
}

/// The configured set of named disks. Disk names act as an allow-list:
/// a reference naming an unknown disk is treated as an unsafe path.
#[derive(Debug, Clone)]
pub struct DiskRegistry {
    disks: HashMap<String, LocalDisk>,
}

impl DiskRegistry {
    #[must_use]
    pub fn new(definitions: &[DiskDefinition]) -> Self {
        let disks = definitions
            .iter()
            .map(|d| (d.name.clone(), LocalDisk::new(&d.name, &d.root)))
            .collect();
        Self { disks }
    }

    /// Create every disk root directory. Called once at startup.
    pub async fn init(&self) -> Result<(), MediaError> {
        for disk in self.disks.values() {
            fs::create_dir_all(disk.root()).await.map_err(|e| {
                MediaError::Storage(format!(
                    "Failed to create root for disk '{}': {e}",
                    disk.name()
                ))
            })?;
        }
        Ok(())
    }

    /// Look up a disk by name. Unknown names are rejected like unsafe
    /// paths so probing for disk names leaks nothing.
    pub fn get(&self, name: &str) -> Result<&LocalDisk, MediaError> {
        self.disks.get(name).ok_or_else(|| {
            warn!(disk = %name.escape_debug(), "Reference to unknown disk rejected");
            MediaError::PathUnsafe
        })
    }
}

fn io_error(disk: &str, op: &str, path: &str, e: &std::io::Error) -> MediaError {
    warn!(disk = %disk, op = %op, path = %path, error = %e, "Disk operation failed");
    MediaError::Storage(format!("{op} failed on disk '{disk}': {e}"))
}
