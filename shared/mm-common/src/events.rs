//! Selection/Event Protocol
//!
//! The contract by which a consuming form learns that a file was chosen,
//! uploaded, or cleared. Every observable picker outcome produces exactly
//! one of these events, carrying the form field it belongs to, a stable
//! reference (catalog id or disk-relative path), and descriptive metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{FileInfo, MediaSummary};

/// Events emitted by a picker session toward its consuming form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PickerEvent {
    /// An existing managed media item was chosen; the reference is its id.
    MediaSelected {
        /// Form field the picker is bound to.
        field_id: String,
        /// Catalog identifier of the selected record.
        media_id: Uuid,
        /// Descriptive metadata for the selection.
        media: Box<MediaSummary>,
    },
    /// A direct file was chosen or uploaded; the reference is its path.
    FileUploaded {
        /// Form field the picker is bound to.
        field_id: String,
        /// Disk-relative path of the file.
        path: String,
        /// Probed metadata for the file.
        info: Box<FileInfo>,
    },
    /// The current managed-media selection was removed.
    MediaCleared {
        /// Form field the picker is bound to.
        field_id: String,
    },
    /// The current direct-file selection was removed.
    FileCleared {
        /// Form field the picker is bound to.
        field_id: String,
    },
}

impl PickerEvent {
    /// The form field this event belongs to.
    #[must_use]
    pub fn field_id(&self) -> &str {
        match self {
            Self::MediaSelected { field_id, .. }
            | Self::FileUploaded { field_id, .. }
            | Self::MediaCleared { field_id }
            | Self::FileCleared { field_id } => field_id,
        }
    }

    /// The stable reference carried by the event, if any.
    #[must_use]
    pub fn reference(&self) -> Option<String> {
        match self {
            Self::MediaSelected { media_id, .. } => Some(media_id.to_string()),
            Self::FileUploaded { path, .. } => Some(path.clone()),
            Self::MediaCleared { .. } | Self::FileCleared { .. } => None,
        }
    }
}
