//! Filesystem-backed distribution links.
//!
//! Implements the core `LinkStore` capability with project-local links
//! pointing at centrally stored artifacts. Symlinks where the platform
//! supports them, hard links elsewhere.

use std::path::PathBuf;

use transcache_core::{Error, LinkStore};

/// Link store rooted at a links directory, targeting the artifacts dir.
#[derive(Debug, Clone)]
pub struct FsLinkStore {
    links_dir: PathBuf,
    artifacts_dir: PathBuf,
}

impl FsLinkStore {
    pub fn new(links_dir: PathBuf, artifacts_dir: PathBuf) -> Self {
        Self { links_dir, artifacts_dir }
    }

    fn is_link_for(name: &str, id: &str) -> bool {
        name.starts_with(&format!("tr_{id}"))
    }
}

impl LinkStore for FsLinkStore {
    fn create_link(&self, id: &str, filename: &str) -> Result<(), Error> {
        std::fs::create_dir_all(&self.links_dir)
            .map_err(|e| Error::Filesystem(format!("failed to create links dir: {e}")))?;

        // Symlink targets are interpreted relative to the link's own
        // directory, so a relative artifacts dir must be resolved to an
        // absolute path before it becomes a target.
        let target = std::fs::canonicalize(&self.artifacts_dir)
            .map_err(|e| {
                Error::Filesystem(format!(
                    "failed to resolve artifacts dir {}: {}",
                    self.artifacts_dir.display(),
                    e
                ))
            })?
            .join(filename);
        let link = self.links_dir.join(filename);

        // symlink_metadata sees the link itself; exists() traverses it.
        // A link whose target resolves is left alone, a dangling one is
        // replaced.
        if std::fs::symlink_metadata(&link).is_ok() {
            if link.exists() {
                return Ok(());
            }
            std::fs::remove_file(&link).map_err(|e| {
                Error::Filesystem(format!(
                    "failed to replace dangling link {}: {}",
                    link.display(),
                    e
                ))
            })?;
        }

        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(&target, &link);
        #[cfg(not(unix))]
        let result = std::fs::hard_link(&target, &link);

        result.map_err(|e| {
            Error::Filesystem(format!("failed to link {} for {}: {}", link.display(), id, e))
        })
    }

    fn remove_links(&self, id: &str) -> Result<usize, Error> {
        let entries = match std::fs::read_dir(&self.links_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::Filesystem(format!("failed to read links dir: {e}"))),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if Self::is_link_for(name, id) {
                std::fs::remove_file(entry.path()).map_err(|e| {
                    Error::Filesystem(format!("failed to remove link {}: {}", name, e))
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn count_links(&self, id: &str) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.links_dir) else { return 0 };
        entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| Self::is_link_for(name, id))
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, FsLinkStore) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("artifacts");
        let links = dir.path().join("links");
        std::fs::create_dir_all(&artifacts).unwrap();
        let store = FsLinkStore::new(links, artifacts);
        (dir, store)
    }

    #[test]
    fn test_create_and_count_links() {
        let (_dir, store) = setup();
        std::fs::write(store.artifacts_dir.join("tr_dQw4w9WgXcQ_my_video.md"), "x").unwrap();

        store.create_link("dQw4w9WgXcQ", "tr_dQw4w9WgXcQ_my_video.md").unwrap();
        assert_eq!(store.count_links("dQw4w9WgXcQ"), 1);
        assert_eq!(store.count_links("otherotherr"), 0);

        // Creating the same link again is a no-op.
        store.create_link("dQw4w9WgXcQ", "tr_dQw4w9WgXcQ_my_video.md").unwrap();
        assert_eq!(store.count_links("dQw4w9WgXcQ"), 1);
    }

    #[test]
    fn test_remove_links() {
        let (_dir, store) = setup();
        std::fs::write(store.artifacts_dir.join("tr_aaaaaaaaaaa_one.md"), "x").unwrap();
        std::fs::write(store.artifacts_dir.join("tr_bbbbbbbbbbb_two.md"), "x").unwrap();
        store.create_link("aaaaaaaaaaa", "tr_aaaaaaaaaaa_one.md").unwrap();
        store.create_link("bbbbbbbbbbb", "tr_bbbbbbbbbbb_two.md").unwrap();

        let removed = store.remove_links("aaaaaaaaaaa").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_links("aaaaaaaaaaa"), 0);
        assert_eq!(store.count_links("bbbbbbbbbbb"), 1);
    }

    #[test]
    fn test_remove_links_missing_dir_is_zero() {
        let (_dir, store) = setup();
        assert_eq!(store.remove_links("aaaaaaaaaaa").unwrap(), 0);
    }

    #[test]
    fn test_create_link_with_relative_dirs_resolves() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        std::fs::create_dir_all("./transcripts").unwrap();
        std::fs::write("./transcripts/tr_dQw4w9WgXcQ_my_video.md", "hello world").unwrap();

        let store = FsLinkStore::new(
            PathBuf::from("./transcripts/links"),
            PathBuf::from("./transcripts"),
        );
        store.create_link("dQw4w9WgXcQ", "tr_dQw4w9WgXcQ_my_video.md").unwrap();

        // Reading through the link proves the target resolves.
        let via_link =
            std::fs::read_to_string("./transcripts/links/tr_dQw4w9WgXcQ_my_video.md").unwrap();
        assert_eq!(via_link, "hello world");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_link_replaces_dangling_link() {
        let (_dir, store) = setup();
        std::fs::write(store.artifacts_dir.join("tr_dQw4w9WgXcQ_my_video.md"), "hello").unwrap();
        std::fs::create_dir_all(&store.links_dir).unwrap();

        // A leftover link whose target no longer exists.
        std::os::unix::fs::symlink(
            store.artifacts_dir.join("no_such_file.md"),
            store.links_dir.join("tr_dQw4w9WgXcQ_my_video.md"),
        )
        .unwrap();

        store.create_link("dQw4w9WgXcQ", "tr_dQw4w9WgXcQ_my_video.md").unwrap();

        let via_link = std::fs::read_to_string(store.links_dir.join("tr_dQw4w9WgXcQ_my_video.md"))
            .unwrap();
        assert_eq!(via_link, "hello");
    }
}
