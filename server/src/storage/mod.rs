//! Storage Layer
//!
//! Named-disk filesystem access behind the path-safety guard, and the
//! resolver that decides whether an upload becomes a managed catalog
//! record or a bare path on a disk. All filesystem mutation in the
//! service goes through this module.

pub mod disk;
pub mod path_guard;
pub mod resolver;

pub use disk::{DiskRegistry, LocalDisk};
pub use resolver::{store_direct, store_managed, summarize, StoredReference};
