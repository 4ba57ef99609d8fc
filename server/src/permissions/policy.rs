//! Access scoping policy.
//!
//! Derives, per call, the subset of stored items a caller may see. The
//! result is a value object consumed by the catalog queries; it is never
//! cached across requests because branch context and capabilities can
//! change between them.

use mm_common::{AcceptMode, TypeFilter};
use uuid::Uuid;

use super::{Caller, Capability};
use crate::error::MediaError;

/// The visibility predicate for a single request.
///
/// Applied identically to listing and to selection-by-id, so a caller can
/// never select an item that listing would have hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaScope {
    /// Restrict to this branch (None = no branch restriction).
    pub branch_id: Option<Uuid>,
    /// Restrict to this owner (None = no owner restriction).
    pub owner_id: Option<Uuid>,
    /// Effective type restriction.
    pub filter: TypeFilter,
}

/// The single place scoping rules are evaluated.
pub struct AccessPolicy;

impl AccessPolicy {
    /// Resolve the visibility scope for `caller` under `accept_mode`.
    ///
    /// Rules, in order:
    /// 1. without `BYPASS_BRANCH_SCOPE`, a caller with a branch only sees
    ///    that branch's items;
    /// 2. without `VIEW_OTHERS_MEDIA`, the caller only sees their own;
    /// 3. the type restriction follows the accept mode — the requested
    ///    in-session filter is honored only under [`AcceptMode::Mixed`]
    ///    and silently reset to the mode's fixed default otherwise.
    pub fn resolve(
        caller: &Caller,
        accept_mode: AcceptMode,
        requested_filter: TypeFilter,
    ) -> Result<MediaScope, MediaError> {
        caller.require(Capability::VIEW_MEDIA)?;

        let branch_id = if caller.can(Capability::BYPASS_BRANCH_SCOPE) {
            None
        } else {
            caller.branch_id
        };

        let owner_id = if caller.can(Capability::VIEW_OTHERS_MEDIA) {
            None
        } else {
            Some(caller.id)
        };

        let filter = if accept_mode.filter_adjustable() {
            requested_filter
        } else {
            accept_mode.default_filter()
        };

        Ok(MediaScope {
            branch_id,
            owner_id,
            filter,
        })
    }
}
