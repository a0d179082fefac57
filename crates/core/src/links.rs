//! Distribution-link collaborator boundary.
//!
//! Link mechanics (symlinks, hard links, per-platform fallbacks) live
//! outside the core; the engine only needs this capability interface.

use crate::Error;

/// Capability interface for the distribution-link collaborator.
///
/// The integrity sweep and the statistics projection consume this; the
/// binary supplies a filesystem-backed implementation.
pub trait LinkStore {
    /// Create a link for `id` pointing at the artifact `filename`.
    fn create_link(&self, id: &str, filename: &str) -> Result<(), Error>;

    /// Remove all links for `id`, returning how many were removed.
    fn remove_links(&self, id: &str) -> Result<usize, Error>;

    /// Count existing links for `id`.
    fn count_links(&self, id: &str) -> usize;
}

/// No-op link store for contexts with no distribution directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLinkStore;

impl LinkStore for NullLinkStore {
    fn create_link(&self, _id: &str, _filename: &str) -> Result<(), Error> {
        Ok(())
    }

    fn remove_links(&self, _id: &str) -> Result<usize, Error> {
        Ok(0)
    }

    fn count_links(&self, _id: &str) -> usize {
        0
    }
}
