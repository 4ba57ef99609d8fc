//! Validated Upload Gate
//!
//! Enforces size, extension, MIME, content, and dimension constraints on
//! a raw upload before anything is persisted. A rejection here leaves no
//! file and no catalog record behind.

use std::io::Cursor;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use image::ImageReader;
use mm_common::{AcceptMode, DimensionConstraints};

use crate::error::MediaError;

use super::processing::mime_to_format;

/// How much of the payload is inspected for embedded markup.
const MARKUP_SCAN_WINDOW: usize = 8 * 1024;

/// Extensions accepted in image mode.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Extensions accepted in file (document) mode.
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "csv", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip",
];

/// MIME types accepted in image mode.
const IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// MIME types accepted in file (document) mode.
const DOCUMENT_MIMES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
];

/// Markup signatures that reject an upload outright, including their
/// HTML-entity-escaped spellings. Blocks content-type spoofing where an
/// executable HTML payload hides behind an image extension.
static MARKUP_SIGNATURES: LazyLock<AhoCorasick> = LazyLock::new(|| {
    let tags = ["script", "iframe", "html", "object", "embed"];
    let mut patterns = Vec::with_capacity(tags.len() * 4);
    for tag in tags {
        patterns.push(format!("<{tag}"));
        patterns.push(format!("&lt;{tag}"));
        patterns.push(format!("&#60;{tag}"));
        patterns.push(format!("&#x3c;{tag}"));
    }
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("markup signature set must compile")
});

/// A raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-declared filename.
    pub file_name: String,
    /// Client-declared MIME type, if any.
    pub declared_mime: Option<String>,
    /// Full file content.
    pub data: Vec<u8>,
}

/// The active constraints for one gate evaluation.
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Fixed type constraint for the session.
    pub accept_mode: AcceptMode,
    /// Maximum size in kilobytes; a file of exactly `max_kb * 1024`
    /// bytes passes.
    pub max_kb: u64,
    /// Pixel dimension constraints (images only).
    pub constraints: DimensionConstraints,
    /// Custom MIME allow-list; overrides the per-mode defaults entirely.
    pub allowed_mimes: Option<Vec<String>>,
}

/// An upload that passed every gate check.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    /// Sanitized filename.
    pub file_name: String,
    /// Lowercased extension (no leading dot).
    pub extension: String,
    /// Verified MIME type.
    pub mime_type: String,
    /// Full file content.
    pub data: Vec<u8>,
    /// Pixel width (images only).
    pub width: Option<u32>,
    /// Pixel height (images only).
    pub height: Option<u32>,
}

impl ValidatedUpload {
    /// Whether the validated content is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Run the full gate over a raw upload.
///
/// Checks, in order: presence, size ceiling, filename/extension,
/// declared-type allow-lists, content-vs-declared MIME agreement,
/// embedded markup, and image pixel dimensions.
pub fn validate_upload(
    request: UploadRequest,
    rules: &UploadRules,
) -> Result<ValidatedUpload, MediaError> {
    if request.data.is_empty() {
        return Err(MediaError::NoFile);
    }

    // Exact KB ceiling: the boundary value is valid.
    if request.data.len() as u64 > rules.max_kb * 1024 {
        return Err(MediaError::TooLarge {
            max_kb: rules.max_kb,
        });
    }

    let file_name = sanitize_filename(&request.file_name);
    if file_name.is_empty() {
        return Err(MediaError::InvalidFilename);
    }
    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(MediaError::InvalidFilename)?;

    let declared_mime = request
        .declared_mime
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            mime_guess::from_path(&file_name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // A caller-supplied MIME allow-list replaces the per-mode defaults.
    if let Some(custom) = &rules.allowed_mimes {
        if !custom.iter().any(|m| m == &declared_mime) {
            return Err(MediaError::InvalidMimeType {
                mime_type: declared_mime,
            });
        }
    } else {
        if !allowed_extensions(rules.accept_mode).contains(&extension.as_str()) {
            return Err(MediaError::Validation(format!(
                "File extension .{extension} is not accepted here"
            )));
        }
        if !allowed_mimes(rules.accept_mode).contains(&declared_mime.as_str()) {
            return Err(MediaError::InvalidMimeType {
                mime_type: declared_mime,
            });
        }
    }

    let mime_type = verify_file_content(&request.data, &declared_mime)?;

    scan_for_markup(&request.data)?;

    let (width, height) = if mime_type.starts_with("image/") {
        let (w, h) = probe_dimensions(&request.data, &mime_type)?;
        check_dimensions(w, h, rules.constraints)?;
        (Some(w), Some(h))
    } else {
        (None, None)
    };

    Ok(ValidatedUpload {
        file_name,
        extension,
        mime_type,
        data: request.data,
        width,
        height,
    })
}

/// Extension allow-list for a mode.
fn allowed_extensions(mode: AcceptMode) -> Vec<&'static str> {
    match mode {
        AcceptMode::Image => IMAGE_EXTENSIONS.to_vec(),
        AcceptMode::File => DOCUMENT_EXTENSIONS.to_vec(),
        AcceptMode::Mixed => {
            let mut all = IMAGE_EXTENSIONS.to_vec();
            all.extend_from_slice(DOCUMENT_EXTENSIONS);
            all
        }
    }
}

/// MIME allow-list for a mode.
fn allowed_mimes(mode: AcceptMode) -> Vec<&'static str> {
    match mode {
        AcceptMode::Image => IMAGE_MIMES.to_vec(),
        AcceptMode::File => DOCUMENT_MIMES.to_vec(),
        AcceptMode::Mixed => {
            let mut all = IMAGE_MIMES.to_vec();
            all.extend_from_slice(DOCUMENT_MIMES);
            all
        }
    }
}

/// Validate file content against its claimed MIME type using magic byte
/// detection.
///
/// Returns the verified MIME type (detected from content, or the claimed
/// type for formats where magic byte detection isn't possible like plain
/// text).
fn verify_file_content(data: &[u8], claimed_mime: &str) -> Result<String, MediaError> {
    // infer can't detect plain text via magic bytes. Accept if the
    // content is valid UTF-8 with no null bytes (binary indicator).
    if claimed_mime == "text/plain" || claimed_mime == "text/csv" {
        if std::str::from_utf8(data).is_ok() && !data.contains(&0) {
            return Ok(claimed_mime.to_string());
        }
        return Err(MediaError::InvalidMimeType {
            mime_type: format!("binary data claimed as {claimed_mime}"),
        });
    }

    let detected = if let Some(kind) = infer::get(data) {
        kind.mime_type().to_string()
    } else {
        tracing::warn!(
            claimed_mime = %claimed_mime,
            size = data.len(),
            "File content does not match any known magic byte signature"
        );
        return Err(MediaError::InvalidMimeType {
            mime_type: format!("{claimed_mime} (content unrecognizable)"),
        });
    };

    if detected == claimed_mime {
        return Ok(detected);
    }

    // Known equivalent pairs
    let compatible = matches!(
        (claimed_mime, detected.as_str()),
        ("image/jpg", "image/jpeg")
            | ("application/msword", "application/x-ole-storage")
            | ("application/vnd.ms-excel", "application/x-ole-storage")
            | ("application/vnd.ms-powerpoint", "application/x-ole-storage")
    );
    if compatible {
        return Ok(claimed_mime.to_string());
    }

    tracing::warn!(
        claimed_mime = %claimed_mime,
        detected_mime = %detected,
        "File content type mismatch"
    );
    Err(MediaError::InvalidMimeType {
        mime_type: format!("{claimed_mime} (detected: {detected})"),
    })
}

/// Inspect the first 8 KB for markup signatures, regardless of declared
/// type.
fn scan_for_markup(data: &[u8]) -> Result<(), MediaError> {
    let window = &data[..data.len().min(MARKUP_SCAN_WINDOW)];
    if let Some(hit) = MARKUP_SIGNATURES.find(window) {
        tracing::warn!(
            offset = hit.start(),
            "Upload rejected: embedded markup signature in content"
        );
        return Err(MediaError::Validation(
            "File content contains embedded markup and was rejected".to_string(),
        ));
    }
    Ok(())
}

/// Read image dimensions from the header without a full decode.
fn probe_dimensions(data: &[u8], mime_type: &str) -> Result<(u32, u32), MediaError> {
    let format = mime_to_format(mime_type).map_err(|e| MediaError::Validation(e.to_string()))?;
    ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|e| MediaError::Validation(format!("Image decode failed: {e}")))
}

/// Enforce pixel dimension constraints, independent of byte size.
fn check_dimensions(
    width: u32,
    height: u32,
    constraints: DimensionConstraints,
) -> Result<(), MediaError> {
    if let Some(max) = constraints.max_width {
        if width > max {
            return Err(MediaError::Validation(format!(
                "Image width {width}px exceeds maximum {max}px"
            )));
        }
    }
    if let Some(max) = constraints.max_height {
        if height > max {
            return Err(MediaError::Validation(format!(
                "Image height {height}px exceeds maximum {max}px"
            )));
        }
    }
    if let Some(min) = constraints.min_width {
        if width < min {
            return Err(MediaError::Validation(format!(
                "Image width {width}px is below minimum {min}px"
            )));
        }
    }
    if let Some(min) = constraints.min_height {
        if height < min {
            return Err(MediaError::Validation(format!(
                "Image height {height}px is below minimum {min}px"
            )));
        }
    }
    Ok(())
}

/// Sanitize a filename to prevent path traversal and other issues.
pub fn sanitize_filename(filename: &str) -> String {
    // Extract just the filename part (no directory components)
    let name = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    // Remove dangerous characters, keep alphanumeric, dots, dashes, underscores
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .take(255)
        .collect()
}
