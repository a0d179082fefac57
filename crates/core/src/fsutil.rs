//! Atomic filesystem primitives.
//!
//! Every durable mutation in transcache goes through write-temp-then-rename
//! so that a crash at any point leaves the target either fully old or
//! fully new, never partial.

use std::path::{Path, PathBuf};

use crate::Error;

/// Sibling temp path for an atomic write (`<path>.tmp`).
pub fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Write `contents` to `path` atomically.
///
/// Writes the full contents to a sibling temp file, verifies the temp file
/// exists, then renames it onto the canonical path. Platforms that refuse
/// to rename over an existing file fall back to explicit remove-and-replace.
/// Any failing step removes the temp file and propagates the error; the
/// prior canonical file is left untouched.
pub async fn atomic_write(path: &Path, contents: &str) -> Result<(), Error> {
    let tmp = temp_path(path);

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::Filesystem(format!(
            "failed to write temp file {}: {}",
            tmp.display(),
            e
        )));
    }

    // Paranoid existence check before committing the rename.
    if let Err(e) = tokio::fs::metadata(&tmp).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::Filesystem(format!(
            "temp file {} vanished before rename: {}",
            tmp.display(),
            e
        )));
    }

    if let Err(rename_err) = tokio::fs::rename(&tmp, path).await {
        // Windows refuses in-place replacement; retry after removing the
        // destination. If the retry fails too, clean up and report.
        if tokio::fs::metadata(path).await.is_ok() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(Error::Filesystem(format!(
                    "failed to replace {}: {}",
                    path.display(),
                    e
                )));
            }
            if let Err(e) = tokio::fs::rename(&tmp, path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(Error::Filesystem(format!(
                    "failed to rename {} -> {}: {}",
                    tmp.display(),
                    path.display(),
                    e
                )));
            }
            return Ok(());
        }

        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::Filesystem(format!(
            "failed to rename {} -> {}: {}",
            tmp.display(),
            path.display(),
            rename_err
        )));
    }

    Ok(())
}
