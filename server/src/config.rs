//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// A named disk definition: a filesystem root addressed by short name.
#[derive(Debug, Clone)]
pub struct DiskDefinition {
    /// Disk name used in `(disk, path)` addressing.
    pub name: String,
    /// Filesystem root directory.
    pub root: PathBuf,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// `SQLite` database URL (e.g., "sqlite://data/media.db")
    pub database_url: String,

    /// Named disk roots, parsed from `MEDIA_DISKS`
    /// (comma-separated `name=/path` pairs)
    pub disks: Vec<DiskDefinition>,

    /// Default maximum upload size in kilobytes (default: 10240 = 10 MB)
    pub max_upload_kb: u64,

    /// Maximum image pixel width accepted at upload (default: 8192)
    pub max_image_width: u32,

    /// Maximum image pixel height accepted at upload (default: 8192)
    pub max_image_height: u32,

    /// Global MIME allow-list override (comma-separated); `None` keeps
    /// the per-mode defaults
    pub allowed_mime_types: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            disks: parse_disks(
                &env::var("MEDIA_DISKS")
                    .unwrap_or_else(|_| "media=./data/media,attachments=./data/attachments".into()),
            )?,
            max_upload_kb: env::var("MAX_UPLOAD_KB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024), // 10MB
            max_image_width: env::var("MAX_IMAGE_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8192),
            max_image_height: env::var("MAX_IMAGE_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8192),
            allowed_mime_types: env::var("ALLOWED_MIME_TYPES").ok().map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }),
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses an in-memory `SQLite` database and disk roots under the
    /// system temp directory.
    #[must_use]
    pub fn default_for_test() -> Self {
        let tmp = env::temp_dir().join("mm-server-test");
        Self {
            bind_address: "127.0.0.1:8080".into(),
            database_url: "sqlite::memory:".into(),
            disks: vec![
                DiskDefinition {
                    name: "media".into(),
                    root: tmp.join("media"),
                },
                DiskDefinition {
                    name: "attachments".into(),
                    root: tmp.join("attachments"),
                },
            ],
            max_upload_kb: 10 * 1024,
            max_image_width: 8192,
            max_image_height: 8192,
            allowed_mime_types: None,
        }
    }
}

/// Parse the `MEDIA_DISKS` variable: comma-separated `name=/path` pairs.
fn parse_disks(raw: &str) -> Result<Vec<DiskDefinition>> {
    let mut disks = Vec::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (name, root) = entry
            .split_once('=')
            .with_context(|| format!("Invalid MEDIA_DISKS entry: {entry}"))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Empty disk name in MEDIA_DISKS entry: {entry}");
        }
        disks.push(DiskDefinition {
            name: name.to_string(),
            root: PathBuf::from(root.trim()),
        });
    }
    if disks.is_empty() {
        anyhow::bail!("MEDIA_DISKS must define at least one disk");
    }
    Ok(disks)
}
