//! `MediaManager` Server Library
//!
//! Scoped media and attachment management: a validated upload gate, a
//! managed media catalog with branch/owner scoping, direct named-disk
//! storage behind a path-safety guard, picker sessions with incremental
//! listing, and transactional attachment batches.

pub mod api;
pub mod attachments;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod permissions;
pub mod picker;
pub mod storage;
