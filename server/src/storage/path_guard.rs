//! Path-Safety Guard
//!
//! The sole authority for disk-relative path validation. Applied before
//! every read, write, list, and delete — including internally-constructed
//! paths derived from a previously-validated upload. Rejections are
//! logged as security-relevant events and surfaced as `PathUnsafe`,
//! which callers render identically to "not found".

use tracing::warn;

use crate::error::MediaError;

/// Check whether a disk-relative path is safe to hand to the filesystem.
///
/// Rejects null bytes, backslashes, absolute paths, and any `.`, `..`,
/// or empty segment. The empty path is allowed: it addresses the disk
/// root (used by directory listings).
#[must_use]
pub fn is_safe(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    if path.contains('\0') || path.contains('\\') {
        return false;
    }
    if path.starts_with('/') {
        return false;
    }
    !path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
}

/// Whether `path` lives under the configured `root`. An empty root means
/// no restriction.
#[must_use]
pub fn within_root(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    path == root || path.starts_with(&format!("{root}/"))
}

/// [`is_safe`] as a `Result`, logging the rejection.
pub fn ensure_safe(path: &str) -> Result<(), MediaError> {
    if is_safe(path) {
        Ok(())
    } else {
        warn!(path = %path.escape_debug(), "Path rejected by safety guard");
        Err(MediaError::PathUnsafe)
    }
}

/// [`within_root`] as a `Result`, logging the rejection.
pub fn ensure_within_root(path: &str, root: &str) -> Result<(), MediaError> {
    if within_root(path, root) {
        Ok(())
    } else {
        warn!(
            path = %path.escape_debug(),
            root = %root,
            "Path outside configured storage root"
        );
        Err(MediaError::PathUnsafe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_normal_paths() {
        assert!(is_safe("media/photo.png"));
        assert!(is_safe("a/b/c/d.txt"));
        assert!(is_safe("file.pdf"));
        assert!(is_safe(""));
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(!is_safe("../../etc/passwd"));
        assert!(!is_safe("media/../../../etc/passwd"));
        assert!(!is_safe(".."));
        assert!(!is_safe("media/.."));
    }

    #[test]
    fn test_rejects_absolute_paths() {
        assert!(!is_safe("/etc/passwd"));
    }

    #[test]
    fn test_rejects_null_bytes_and_backslashes() {
        assert!(!is_safe("media/pho\0to.png"));
        assert!(!is_safe("media\\photo.png"));
    }

    #[test]
    fn test_rejects_dot_and_empty_segments() {
        assert!(!is_safe("media/./photo.png"));
        assert!(!is_safe("media//photo.png"));
        assert!(!is_safe("media/"));
    }

    #[test]
    fn test_within_root() {
        assert!(within_root("branding/logo.png", "branding"));
        assert!(within_root("branding", "branding"));
        assert!(!within_root("brandingx/logo.png", "branding"));
        assert!(!within_root("other/logo.png", "branding"));
        assert!(within_root("anything/at/all", ""));
    }
}
