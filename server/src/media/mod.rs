//! Validated Upload Gate and Image Processing
//!
//! Everything an uploaded byte stream must pass before the storage layer
//! is allowed to persist it.

pub mod processing;
pub mod validate;

pub use validate::{
    sanitize_filename, validate_upload, UploadRequest, UploadRules, ValidatedUpload,
};
