//! Validation and joining of remote paths.
//!
//! Logical paths come straight from callers, so they are checked for
//! traversal before being combined with the configured base path. Remote
//! paths always use `/` regardless of the local OS.

use crate::error::{ensure_not_blank, ensure_that, Result, UploadError};

/// Split a `/`-separated path into its meaningful segments.
///
/// Empty segments (from leading, trailing or doubled slashes) and `.` are
/// dropped.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Join path fragments into an absolute remote path.
///
/// ```
/// use indigo_upload::security::join_remote;
///
/// assert_eq!(join_remote(&["/data", "avatars/", "20240101"]), "/data/avatars/20240101");
/// assert_eq!(join_remote(&["data//x"]), "/data/x");
/// assert_eq!(join_remote(&[]), "/");
/// ```
pub fn join_remote(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .flat_map(|part| segments(part))
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined)
}

/// Join path fragments into a relative path without a leading slash.
pub fn join_relative(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| segments(part))
        .collect::<Vec<_>>()
        .join("/")
}

/// Check a caller-supplied logical path.
///
/// An empty logical path is allowed (files land directly under the base
/// path), but `..` segments, backslashes and NUL bytes are rejected.
pub fn validate_logical_path(path: &str) -> Result<()> {
    if path.contains('\0') {
        return Err(UploadError::Validation("path contains null bytes".into()));
    }
    if path.contains('\\') {
        return Err(UploadError::Validation(format!(
            "path must use '/' separators: {}",
            path
        )));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(UploadError::Validation(format!(
            "path traversal attempt detected: {}",
            path
        )));
    }
    Ok(())
}

/// Check a relative path returned by a previous store call.
pub fn validate_relative_path(path: &str) -> Result<()> {
    ensure_not_blank(path, "relative path")?;
    validate_logical_path(path)?;
    ensure_that(
        segments(path).next().is_some(),
        format!("relative path has no file component: {}", path),
    )
}

/// Check a file name that will become the last remote path segment.
pub fn validate_file_name(name: &str) -> Result<()> {
    ensure_not_blank(name, "file name")?;
    if name.contains('/') || name.contains('\\') {
        return Err(UploadError::Validation(format!(
            "file name must not contain path separators: {}",
            name
        )));
    }
    ensure_that(name != "." && name != "..", format!("invalid file name: {}", name))?;
    ensure_that(!name.contains('\0'), "file name contains null bytes")
}
