//! Database Models

use chrono::{DateTime, Utc};
use mm_common::MediaSummary;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Managed media catalog record.
///
/// `disk` and `path` are immutable after insert; only the descriptive
/// `name` may change.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub name: String,
    pub file_name: String,
    pub disk: String,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub mime_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub optimized_size_bytes: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub blurhash: Option<String>,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Whether the stored file is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Build the caller-facing DTO. The thumbnail URL is resolved by the
    /// storage layer and passed in, keeping this model storage-agnostic.
    #[must_use]
    pub fn into_summary(self, thumbnail_url: Option<String>) -> MediaSummary {
        MediaSummary {
            id: self.id,
            name: self.name,
            file_name: self.file_name,
            mime_type: self.mime_type,
            extension: self.extension,
            size_bytes: self.size_bytes,
            optimized_size_bytes: self.optimized_size_bytes,
            width: self.width,
            height: self.height,
            thumbnail_url,
            owner_id: self.owner_id,
            branch_id: self.branch_id,
            created_at: self.created_at,
        }
    }
}

/// Parameters for inserting a new media record.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub name: String,
    pub file_name: String,
    pub disk: String,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub mime_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub optimized_size_bytes: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub blurhash: Option<String>,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

/// Attachment record for a business entity (note, ticket, project...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: Uuid,
    pub parent_kind: String,
    pub parent_id: Uuid,
    pub disk: String,
    pub path: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
