//! In-process acceleration cache for registry entries.
//!
//! A bounded LRU shadow of the persistent registry, plus a separately
//! cached lightweight metadata projection used for statistics. The cache
//! is never authoritative: it is wholly invalidated immediately before
//! any registry write and repopulation is blocked until the write
//! finishes, so a reader can never observe an entry that an in-flight
//! write is about to contradict.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::registry::Entry;

/// Default maximum resident entries.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Lightweight projection of one entry for statistics display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub id: String,
    pub acquired_at: String,
    pub channel: String,
    pub title: String,
    pub link_count: usize,
}

/// Bounded LRU cache over registry entries with a write-window guard.
#[derive(Debug)]
pub struct AccelerationCache {
    entries: LruCache<String, Entry>,
    projection: Option<Vec<EntryMeta>>,
    write_in_progress: bool,
}

impl AccelerationCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self { entries: LruCache::new(cap), projection: None, write_in_progress: false }
    }

    /// Look up an entry, refreshing its recency.
    ///
    /// Returns `None` unconditionally while a write is in progress;
    /// callers must fall back to a direct registry read.
    pub fn get(&mut self, id: &str) -> Option<&Entry> {
        if self.write_in_progress {
            return None;
        }
        self.entries.get(id)
    }

    /// Whether an entry is resident (no recency update, no write-window
    /// bypass).
    pub fn contains(&self, id: &str) -> bool {
        !self.write_in_progress && self.entries.contains(id)
    }

    /// Insert an entry, evicting the least-recently-used one at capacity.
    ///
    /// Ignored during a write window: the state being inserted may be
    /// contradicted by the in-flight write.
    pub fn put(&mut self, id: String, entry: Entry) {
        if self.write_in_progress {
            return;
        }
        self.entries.put(id, entry);
    }

    /// Cached metadata projection, if one has been computed.
    pub fn projection(&self) -> Option<&[EntryMeta]> {
        if self.write_in_progress {
            return None;
        }
        self.projection.as_deref()
    }

    /// Store a freshly computed metadata projection.
    pub fn set_projection(&mut self, rows: Vec<EntryMeta>) {
        if self.write_in_progress {
            return;
        }
        self.projection = Some(rows);
    }

    /// Drop all cached state.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.projection = None;
    }

    /// Enter the write window: clear everything and block repopulation.
    ///
    /// Called by the registry store immediately before a save.
    pub fn begin_write(&mut self) {
        self.invalidate();
        self.write_in_progress = true;
    }

    /// Leave the write window, re-enabling lazy repopulation.
    pub fn end_write(&mut self) {
        self.write_in_progress = false;
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AccelerationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
