// src/filesystem/path.rs

//! Path sanitization utilities
//!
//! Package archives come from untrusted sources. Entry paths are normalized to
//! the relative, `/`-separated form conda uses in `info/files` before any
//! layout rule looks at them, and anything that would escape the package root
//! is rejected.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize an archive entry path
///
/// This function:
/// 1. Rejects paths containing `..` (parent directory) components
/// 2. Skips `.` (current directory) components
/// 3. Strips leading and trailing slashes
/// 4. Converts `\` separators to `/`
/// 5. Returns an error for empty paths
///
/// # Examples
///
/// ```
/// use conda_convert::filesystem::path::sanitize_entry_path;
///
/// assert_eq!(sanitize_entry_path("./bin/foo").unwrap(), "bin/foo");
/// assert_eq!(sanitize_entry_path("Lib/site-packages/").unwrap(), "Lib/site-packages");
/// assert!(sanitize_entry_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_entry_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(Error::PathTraversal(path.to_string())),
            normal => parts.push(normal),
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath(format!(
            "empty archive entry path: {:?}",
            path
        )));
    }

    Ok(parts.join("/"))
}

/// Resolve a directory to a comparable absolute form
///
/// Existing directories are canonicalized so symlinks and `..` compare
/// equal. A directory that does not exist yet is made absolute against the
/// current directory and normalized lexically.
pub fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = dir.canonicalize() {
        return Ok(canonical);
    }

    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    // The parent may already exist behind a symlink
    if let Some(parent) = normalized.parent()
        && let Ok(canonical_parent) = parent.canonicalize()
        && let Some(name) = normalized.file_name()
    {
        return Ok(canonical_parent.join(name));
    }

    Ok(normalized)
}
