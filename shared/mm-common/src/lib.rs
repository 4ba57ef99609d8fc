//! `MediaManager` Common Library
//!
//! Shared types and protocols used by both the media server and consuming
//! clients: accept modes, storage scopes, selection events, and file
//! metadata DTOs.

pub mod events;
pub mod types;

pub use events::PickerEvent;
pub use types::*;
