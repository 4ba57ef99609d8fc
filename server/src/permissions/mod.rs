//! Permission and scoping types.
//!
//! This service never defines role-to-capability mapping; the embedding
//! application resolves the caller's capabilities and branch and installs
//! a [`Caller`] on each request. Every public operation resolves an
//! [`AccessPolicy`] from that caller before touching storage — the rule
//! set lives here and nowhere else.

mod policy;

pub use policy::{AccessPolicy, MediaScope};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bitflags::bitflags;
use uuid::Uuid;

use crate::error::MediaError;

bitflags! {
    /// Media capabilities represented as a 64-bit bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct Capability: u64 {
        /// Permission to list and view media items
        const VIEW_MEDIA          = 1 << 0;
        /// Permission to view media owned by other users
        const VIEW_OTHERS_MEDIA   = 1 << 1;
        /// Permission to upload new media
        const UPLOAD_MEDIA        = 1 << 2;
        /// Permission to delete own media
        const DELETE_MEDIA        = 1 << 3;
        /// Permission to delete media owned by other users
        const DELETE_OTHERS_MEDIA = 1 << 4;
        /// Permission to see media from all branches
        const BYPASS_BRANCH_SCOPE = 1 << 5;
        /// Permission to attach files to business records
        const MANAGE_ATTACHMENTS  = 1 << 6;
    }
}

/// The identity on whose behalf an operation runs.
///
/// Supplied by the embedding application's auth middleware as a request
/// extension; `branch_id` is the caller's current branch context and may
/// change between requests, so scoping is recomputed on every call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Caller {
    /// User ID.
    pub id: Uuid,
    /// Current branch, if the caller belongs to one.
    pub branch_id: Option<Uuid>,
    /// Resolved capability set.
    pub capabilities: Capability,
}

impl Caller {
    /// Check a single capability.
    #[must_use]
    pub const fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Require a capability, failing with `AccessDenied`.
    pub const fn require(&self, capability: Capability) -> Result<(), MediaError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(MediaError::AccessDenied)
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = MediaError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(MediaError::AccessDenied)
    }
}
