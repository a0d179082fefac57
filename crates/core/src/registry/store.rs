//! Crash-safe persistent registry store.
//!
//! The store owns the registry path, the artifacts directory, and the
//! acceleration cache, and is the only component that touches the
//! registry file. Every save validates first and then goes through
//! write-temp-then-rename, so the canonical file is always either fully
//! old or fully new content, even across a crash mid-sequence.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::artifact;
use crate::cache::{AccelerationCache, EntryMeta};
use crate::fsutil::atomic_write;
use crate::links::LinkStore;
use crate::registry::{migration, Entry, Registry};
use crate::Error;

/// Registry store with an in-process acceleration cache.
#[derive(Debug)]
pub struct RegistryStore {
    registry_path: PathBuf,
    artifacts_dir: PathBuf,
    cache: AccelerationCache,
}

impl RegistryStore {
    pub fn new(registry_path: PathBuf, artifacts_dir: PathBuf, cache_capacity: usize) -> Self {
        Self { registry_path, artifacts_dir, cache: AccelerationCache::new(cache_capacity) }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Load the registry from disk, migrating obsolete shapes.
    ///
    /// A missing file is a first run and yields an empty registry. A file
    /// that exists but cannot be parsed is fatal `Corruption`. A parsed
    /// file in the obsolete shape triggers the migration engine; anything
    /// else is validated structurally and rejected when invalid.
    pub async fn load(&mut self) -> Result<Registry, Error> {
        let raw = match tokio::fs::read_to_string(&self.registry_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.registry_path.display(), "no registry file, starting empty");
                return Ok(Registry::default());
            }
            Err(e) => {
                return Err(Error::Filesystem(format!(
                    "failed to read {}: {}",
                    self.registry_path.display(),
                    e
                )));
            }
        };

        let map: serde_json::Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
            Error::Corruption(format!(
                "registry {} is not valid JSON: {}",
                self.registry_path.display(),
                e
            ))
        })?;

        if migration::needs_migration(&map) {
            tracing::info!(entries = map.len(), "obsolete registry shape detected, migrating");
            let (registry, report) = migration::migrate(self, &map).await?;
            tracing::info!(
                migrated = report.migrated,
                renamed_artifacts = report.renamed_artifacts,
                backup = %report.backup_path.display(),
                "registry migration complete"
            );
            return Ok(registry);
        }

        let registry = parse_current(&map)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Persist the registry atomically.
    ///
    /// Validates before touching the disk; an invalid registry never
    /// reaches the file. The acceleration cache is invalidated immediately
    /// before the write and re-enabled after it, success or failure.
    pub async fn save(&mut self, registry: &Registry) -> Result<(), Error> {
        registry.validate()?;

        let json = serde_json::to_string_pretty(registry)
            .map_err(|e| Error::Validation(format!("failed to serialize registry: {e}")))?;

        if let Some(parent) = self.registry_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Filesystem(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        self.cache.begin_write();
        let result = atomic_write(&self.registry_path, &format!("{json}\n")).await;
        self.cache.end_write();
        result
    }

    /// Cache-aware entry lookup.
    ///
    /// During a write window the cache refuses to answer and this falls
    /// through to a direct uncached read of the registry file.
    pub async fn get_entry(&mut self, id: &str) -> Result<Option<Entry>, Error> {
        if let Some(entry) = self.cache.get(id) {
            return Ok(Some(entry.clone()));
        }

        let registry = self.load().await?;
        match registry.get(id) {
            Some(entry) => {
                let entry = entry.clone();
                self.cache.put(id.to_string(), entry.clone());
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Resolved artifact path for an entry.
    pub fn artifact_path_for(&self, id: &str, entry: &Entry) -> PathBuf {
        artifact::artifact_path(&self.artifacts_dir, id, Some(&entry.title))
    }

    /// Whether `id` is registered *and* its backing artifact exists.
    ///
    /// An entry without a backing file does not count: the caller treats
    /// it as a miss and re-acquires, healing prior partial failures.
    pub async fn entry_exists(&mut self, id: &str) -> Result<bool, Error> {
        match self.get_entry(id).await? {
            Some(entry) => {
                let path = self.artifact_path_for(id, &entry);
                Ok(tokio::fs::metadata(&path).await.is_ok())
            }
            None => Ok(false),
        }
    }

    /// Lightweight metadata projection for statistics.
    ///
    /// Cached separately from the full-entry cache; recomputed lazily
    /// after any invalidation.
    pub async fn load_metadata_projection(
        &mut self, links: &dyn LinkStore,
    ) -> Result<Vec<EntryMeta>, Error> {
        if let Some(rows) = self.cache.projection() {
            return Ok(rows.to_vec());
        }

        let registry = self.load().await?;
        let rows: Vec<EntryMeta> = registry
            .iter()
            .map(|(id, entry)| EntryMeta {
                id: id.clone(),
                acquired_at: entry.acquired_at.clone(),
                channel: entry.channel.clone(),
                title: entry.title.clone(),
                link_count: links.count_links(id),
            })
            .collect();

        self.cache.set_projection(rows.clone());
        Ok(rows)
    }

    pub fn cache(&self) -> &AccelerationCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut AccelerationCache {
        &mut self.cache
    }
}

/// Parse a raw JSON map already known to be in the current shape.
fn parse_current(map: &serde_json::Map<String, Value>) -> Result<Registry, Error> {
    map.iter()
        .map(|(id, value)| {
            let entry: Entry = serde_json::from_value(value.clone()).map_err(|e| {
                Error::SchemaViolation(format!("{id}: entry does not match current schema: {e}"))
            })?;
            Ok((id.clone(), entry))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::NullLinkStore;

    fn entry(title: &str) -> Entry {
        Entry { acquired_at: "250115T0930".into(), channel: "chan".into(), title: title.into() }
    }

    fn store_in(dir: &Path) -> RegistryStore {
        RegistryStore::new(dir.join("registry.json"), dir.to_path_buf(), 100)
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let registry = store.load().await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_load_unparseable_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("registry.json"), "{not json").await.unwrap();
        let mut store = store_in(dir.path());
        assert!(matches!(store.load().await, Err(Error::Corruption(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_entry_shape() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"dQw4w9WgXcQ": {"acquired_at": "250115T0930", "channel": "c", "title": "t", "extra": 1}}"#;
        tokio::fs::write(dir.path().join("registry.json"), json).await.unwrap();
        let mut store = store_in(dir.path());
        assert!(matches!(store.load().await, Err(Error::SchemaViolation(_))));
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("my_video"));
        store.save(&registry).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, registry);

        // Pretty-printed, 2-space indent.
        let raw = tokio::fs::read_to_string(dir.path().join("registry.json")).await.unwrap();
        assert!(raw.contains("  \"dQw4w9WgXcQ\""));
    }

    #[tokio::test]
    async fn test_save_invalid_registry_touches_no_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("ok"));
        store.save(&registry).await.unwrap();
        let before = tokio::fs::read_to_string(store.registry_path()).await.unwrap();

        let mut bad = registry.clone();
        bad.upsert("bad".into(), entry("whatever"));
        assert!(store.save(&bad).await.is_err());

        let after = tokio::fs::read_to_string(store.registry_path()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_ignored_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("ok"));
        store.save(&registry).await.unwrap();

        // Simulate a crash that left a half-written temp sibling behind.
        tokio::fs::write(dir.path().join("registry.json.tmp"), "{garbage").await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, registry);
    }

    #[tokio::test]
    async fn test_get_entry_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("my_video"));
        store.save(&registry).await.unwrap();

        assert!(store.cache().is_empty());
        let found = store.get_entry("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert_eq!(found.title, "my_video");
        assert!(store.cache().contains("dQw4w9WgXcQ"));

        // Delete the file behind the cache: cached read still answers.
        tokio::fs::remove_file(store.registry_path()).await.unwrap();
        assert!(store.get_entry("dQw4w9WgXcQ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_window_serves_direct_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("old_title"));
        store.save(&registry).await.unwrap();
        store.get_entry("dQw4w9WgXcQ").await.unwrap();

        // Simulate the window: the file advances while the cache is
        // frozen; reads must reflect the file, not the stale entry.
        registry.upsert("dQw4w9WgXcQ".into(), entry("new_title"));
        let json = serde_json::to_string_pretty(&registry).unwrap();
        tokio::fs::write(store.registry_path(), json).await.unwrap();

        store.cache_mut().begin_write();
        let during = store.get_entry("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert_eq!(during.title, "new_title");
        store.cache_mut().end_write();

        let after = store.get_entry("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert_eq!(after.title, "new_title");
    }

    #[tokio::test]
    async fn test_entry_exists_requires_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("my_video"));
        store.save(&registry).await.unwrap();

        assert!(!store.entry_exists("dQw4w9WgXcQ").await.unwrap());

        let path = dir.path().join("tr_dQw4w9WgXcQ_my_video.md");
        tokio::fs::write(&path, "hello world").await.unwrap();
        assert!(store.entry_exists("dQw4w9WgXcQ").await.unwrap());
    }

    #[tokio::test]
    async fn test_metadata_projection_cached_separately() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());

        let mut registry = Registry::default();
        registry.upsert("dQw4w9WgXcQ".into(), entry("my_video"));
        store.save(&registry).await.unwrap();

        let rows = store.load_metadata_projection(&NullLinkStore).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "dQw4w9WgXcQ");
        assert_eq!(rows[0].link_count, 0);

        // Second call is served from the projection cache.
        tokio::fs::remove_file(store.registry_path()).await.unwrap();
        let again = store.load_metadata_projection(&NullLinkStore).await.unwrap();
        assert_eq!(again, rows);
    }
}
