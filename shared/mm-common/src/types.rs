//! Core Media Types
//!
//! Accept modes, storage scopes, type filters, sort orders, and the
//! metadata DTOs exchanged between the picker and consuming forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The fixed type constraint for a picker session.
///
/// Resolved once at session construction and immutable for the session's
/// lifetime. Legacy accept-type lists are converted through
/// [`AcceptMode::from_legacy`] — never re-interpreted at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum AcceptMode {
    /// Only image files are accepted.
    Image,
    /// Only non-image (document) files are accepted.
    File,
    /// Both images and documents are accepted.
    #[default]
    Mixed,
}

/// Error converting a legacy accept-type list.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized accept types: {0:?}")]
pub struct UnknownAcceptTypes(pub Vec<String>);

impl AcceptMode {
    /// Convert a legacy accept-type list into a mode tag.
    ///
    /// Recognized entries are `"image"`/`"img"` and
    /// `"file"`/`"document"`/`"doc"`. A list containing both families
    /// maps to [`Self::Mixed`]. Any unrecognized entry is a hard error —
    /// a silent fallback to `Mixed` would mask caller misconfiguration.
    pub fn from_legacy<S: AsRef<str>>(kinds: &[S]) -> Result<Self, UnknownAcceptTypes> {
        let mut images = false;
        let mut files = false;
        let mut unknown = Vec::new();

        for kind in kinds {
            match kind.as_ref().trim().to_ascii_lowercase().as_str() {
                "image" | "img" => images = true,
                "file" | "document" | "doc" => files = true,
                other => unknown.push(other.to_string()),
            }
        }

        if !unknown.is_empty() {
            return Err(UnknownAcceptTypes(unknown));
        }

        match (images, files) {
            (true, false) => Ok(Self::Image),
            (false, true) => Ok(Self::File),
            // An empty list means "no restriction requested"
            _ => Ok(Self::Mixed),
        }
    }

    /// The fixed type filter this mode pins non-mixed sessions to.
    #[must_use]
    pub const fn default_filter(self) -> TypeFilter {
        match self {
            Self::Image => TypeFilter::Images,
            Self::File => TypeFilter::Documents,
            Self::Mixed => TypeFilter::All,
        }
    }

    /// Whether the in-session type filter may be changed by the user.
    #[must_use]
    pub const fn filter_adjustable(self) -> bool {
        matches!(self, Self::Mixed)
    }
}

/// Whether uploads become managed catalog records or bare disk files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum StorageScope {
    /// Uploads become catalog-backed media records with thumbnails.
    #[default]
    Media,
    /// Uploads are stored as bare paths on a named disk, no catalog record.
    Direct,
}

/// In-session narrowing filter, adjustable only in [`AcceptMode::Mixed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TypeFilter {
    /// All stored items.
    #[default]
    All,
    /// Image items only.
    Images,
    /// Non-image items only.
    Documents,
}

/// Sort order for media listings.
///
/// All orders tie-break by id so pagination stays stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum MediaSort {
    /// Newest first (default).
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
    /// Internal name, A to Z.
    NameAsc,
    /// Internal name, Z to A.
    NameDesc,
}

/// Pixel dimension constraints for image uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DimensionConstraints {
    /// Maximum pixel width.
    pub max_width: Option<u32>,
    /// Maximum pixel height.
    pub max_height: Option<u32>,
    /// Minimum pixel width.
    pub min_width: Option<u32>,
    /// Minimum pixel height.
    pub min_height: Option<u32>,
}

/// Metadata for a managed media record.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MediaSummary {
    /// Catalog identifier.
    pub id: Uuid,
    /// Internal display name.
    pub name: String,
    /// Original filename as uploaded.
    pub file_name: String,
    /// MIME type.
    pub mime_type: String,
    /// File extension (no leading dot).
    pub extension: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Size of the optimized variant, if one was generated.
    pub optimized_size_bytes: Option<i64>,
    /// Pixel width (images only).
    pub width: Option<i64>,
    /// Pixel height (images only).
    pub height: Option<i64>,
    /// Thumbnail URL, if a thumbnail exists.
    pub thumbnail_url: Option<String>,
    /// Owning user.
    pub owner_id: Option<Uuid>,
    /// Owning branch.
    pub branch_id: Option<Uuid>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl MediaSummary {
    /// Whether the record is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Probed metadata for a direct (unmanaged) file.
///
/// Derived by probing the filesystem on demand — never stored.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FileInfo {
    /// Disk-relative path.
    pub path: String,
    /// Display name (final path segment).
    pub name: String,
    /// MIME type guessed from the extension.
    pub mime_type: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Pixel width (images only, probed).
    pub width: Option<u32>,
    /// Pixel height (images only, probed).
    pub height: Option<u32>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    /// Whether the file is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_legacy_image_only() {
        assert_eq!(AcceptMode::from_legacy(&["image"]), Ok(AcceptMode::Image));
        assert_eq!(AcceptMode::from_legacy(&["IMG"]), Ok(AcceptMode::Image));
    }

    #[test]
    fn test_from_legacy_file_only() {
        assert_eq!(AcceptMode::from_legacy(&["file"]), Ok(AcceptMode::File));
        assert_eq!(AcceptMode::from_legacy(&["document"]), Ok(AcceptMode::File));
    }

    #[test]
    fn test_from_legacy_both_is_mixed() {
        assert_eq!(
            AcceptMode::from_legacy(&["image", "file"]),
            Ok(AcceptMode::Mixed)
        );
    }

    #[test]
    fn test_from_legacy_empty_is_mixed() {
        assert_eq!(
            AcceptMode::from_legacy::<&str>(&[]),
            Ok(AcceptMode::Mixed)
        );
    }

    #[test]
    fn test_from_legacy_unknown_fails_loudly() {
        let err = AcceptMode::from_legacy(&["image", "video"]).unwrap_err();
        assert_eq!(err.0, vec!["video".to_string()]);
    }

    #[test]
    fn test_filter_lock_defaults() {
        assert_eq!(AcceptMode::Image.default_filter(), TypeFilter::Images);
        assert_eq!(AcceptMode::File.default_filter(), TypeFilter::Documents);
        assert_eq!(AcceptMode::Mixed.default_filter(), TypeFilter::All);
        assert!(!AcceptMode::Image.filter_adjustable());
        assert!(!AcceptMode::File.filter_adjustable());
        assert!(AcceptMode::Mixed.filter_adjustable());
    }
}
