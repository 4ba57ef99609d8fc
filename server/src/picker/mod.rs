//! Picker Sessions
//!
//! The stateful core binding one form field to the media library or to a
//! direct disk directory: selection state, the browse listing with
//! search/sort/filter and incremental loading, and the events a consuming
//! form observes.

mod session;

pub use session::{PickerConfig, PickerSession, Selection, PAGE_SIZE};
