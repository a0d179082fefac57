//! Content artifact naming and persistence.
//!
//! Artifacts are UTF-8 markdown transcripts named deterministically from
//! the identifier plus the normalized title, with an optional fixed
//! four-line metadata header.

use std::path::{Path, PathBuf};

use crate::fsutil::atomic_write;
use crate::Error;

/// Filename prefix for all content artifacts.
pub const FILE_PREFIX: &str = "tr";

/// Maximum length of a normalized title embedded in a filename.
pub const MAX_TITLE_LEN: usize = 100;

/// Placeholder used when normalization strips a title to nothing.
pub const EMPTY_TITLE_PLACEHOLDER: &str = "untitled";

/// Maximum accepted artifact size in bytes (10 MiB).
pub const MAX_ARTIFACT_BYTES: usize = 10 * 1024 * 1024;

/// Normalize a raw title into a filename-safe token.
///
/// Lowercases, maps whitespace runs to a single underscore, drops any
/// character that is not a letter, digit, underscore, or dash, collapses
/// consecutive underscores, trims leading/trailing underscores, and
/// truncates to 100 characters. An empty result becomes `"untitled"`.
pub fn normalize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for ch in raw.to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else if ch.is_alphanumeric() || ch == '-' {
            out.push(ch);
        }
    }

    let trimmed = out.trim_matches('_');
    let truncated: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    let final_title = truncated.trim_end_matches('_').to_string();

    if final_title.is_empty() {
        EMPTY_TITLE_PLACEHOLDER.to_string()
    } else {
        final_title
    }
}

/// Deterministic artifact filename for an identifier.
///
/// `tr_<id>_<normalized-title>.md` with metadata, `tr_<id>.md` without.
pub fn artifact_filename(id: &str, normalized_title: Option<&str>) -> String {
    match normalized_title {
        Some(title) => format!("{FILE_PREFIX}_{id}_{title}.md"),
        None => format!("{FILE_PREFIX}_{id}.md"),
    }
}

/// Full artifact path under `dir` for an identifier and normalized title.
pub fn artifact_path(dir: &Path, id: &str, normalized_title: Option<&str>) -> PathBuf {
    dir.join(artifact_filename(id, normalized_title))
}

/// Fixed metadata header written at the top of an artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHeader {
    pub channel: String,
    pub title: String,
    pub video_id: String,
    pub url: String,
}

impl ArtifactHeader {
    /// Render the four-line header block plus its trailing blank line.
    pub fn render(&self) -> String {
        format!(
            "Channel: {}\nTitle: {}\nVideo ID: {}\nURL: {}\n\n",
            self.channel, self.title, self.video_id, self.url
        )
    }
}

/// Write an artifact atomically, overwriting any previous content.
///
/// # Errors
///
/// Returns `Validation` when the combined payload exceeds the 10 MiB cap,
/// `Filesystem` when the write fails.
pub async fn write_artifact(
    path: &Path, header: Option<&ArtifactHeader>, content: &str,
) -> Result<(), Error> {
    let body = match header {
        Some(h) => format!("{}{}", h.render(), content),
        None => content.to_string(),
    };

    if body.len() > MAX_ARTIFACT_BYTES {
        return Err(Error::Validation(format!(
            "artifact {} bytes exceeds {} byte cap",
            body.len(),
            MAX_ARTIFACT_BYTES
        )));
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Filesystem(format!("failed to create {}: {}", parent.display(), e)))?;
    }

    atomic_write(path, &body).await
}
