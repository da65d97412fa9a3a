//! Path handling shared by every adapter.
//!
//! Artifact paths are always `/`-separated and relative to the artifact root.
//! Backend keys are the root prefix joined with such a path.

use crate::{Result, StorageError};

pub const SEPARATOR: char = '/';

/// Normalize a caller-supplied relative path.
///
/// Empty and `.` segments are dropped and `..` pops the previous segment. A
/// `..` that would climb above the artifact root is rejected with
/// [`StorageError::InvalidPath`]; the path is never clamped.
pub fn normalize_relative(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(StorageError::invalid_path(path, "contains a NUL byte"));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::invalid_path(
                        path,
                        "resolves outside the artifact root",
                    ));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// Join a root prefix and a normalized relative path with exactly one separator.
pub fn join(root_prefix: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches(SEPARATOR);
    if relative.is_empty() {
        return root_prefix.to_string();
    }
    if root_prefix.is_empty() {
        return relative.to_string();
    }

    format!("{}/{}", root_prefix.trim_end_matches(SEPARATOR), relative)
}

/// Like [`join`], but suffixed with a separator so it only matches keys
/// strictly below the directory. Empty when listing a bucket root.
pub fn listing_prefix(root_prefix: &str, relative: &str) -> String {
    let prefix = join(root_prefix, relative);
    if prefix.is_empty() || prefix.ends_with(SEPARATOR) {
        prefix
    } else {
        format!("{}{}", prefix, SEPARATOR)
    }
}

/// Inverse of [`join`]: strip the root prefix off a backend key.
///
/// Trailing separators on the key (directory markers) are ignored. Fails with
/// [`StorageError::PathComputation`] when the key is not under the root.
pub fn relative_path(root_prefix: &str, key: &str) -> Result<String> {
    let key = trim_trailing(key);
    if root_prefix.is_empty() {
        return Ok(key.to_string());
    }

    let root = root_prefix.trim_end_matches(SEPARATOR);
    if key == root {
        return Ok(String::new());
    }

    key.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .map(str::to_string)
        .ok_or_else(|| StorageError::PathComputation {
            root: root_prefix.to_string(),
            key: key.to_string(),
        })
}

/// Strip trailing separators, keeping a lone `/` intact.
pub fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}
