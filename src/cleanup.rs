//! Removal of stale output files before a run
//!
//! Runs once, synchronously, before any download starts so that reruns begin
//! from an empty output set.

use globset::Glob;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Delete every regular file in `dir` whose name matches `pattern`
///
/// Only the top level of `dir` is scanned. Files are removed in sorted order
/// and the first failure aborts the cleanup, leaving the remaining matches
/// in place.
///
/// # Returns
///
/// The number of files removed. Running cleanup twice in a row returns 0 the
/// second time.
///
/// # Errors
///
/// - [`Error::Config`] if `pattern` is not a valid glob
/// - [`Error::Cleanup`] if `dir` cannot be listed or a file cannot be removed
///
/// # Examples
///
/// ```no_run
/// use imgfetch::cleanup::cleanup;
/// use std::path::Path;
///
/// let removed = cleanup(Path::new("."), "*.jpeg")?;
/// println!("removed {removed} stale files");
/// # Ok::<(), imgfetch::Error>(())
/// ```
pub fn cleanup(dir: &Path, pattern: &str) -> Result<usize> {
    let matcher = Glob::new(pattern)
        .map_err(|e| {
            Error::config(
                format!("invalid cleanup pattern '{pattern}': {e}"),
                Some("cleanup_pattern"),
            )
        })?
        .compile_matcher();

    let entries = std::fs::read_dir(dir).map_err(|source| Error::Cleanup {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut stale: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Cleanup {
            path: dir.to_path_buf(),
            source,
        })?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && matcher.is_match(entry.file_name()) {
            stale.push(entry.path());
        }
    }
    stale.sort();

    for path in &stale {
        std::fs::remove_file(path).map_err(|source| Error::Cleanup {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "removed stale file");
    }

    if !stale.is_empty() {
        tracing::info!(
            dir = %dir.display(),
            pattern,
            removed = stale.len(),
            "cleaned up stale output files"
        );
    }

    Ok(stale.len())
}
