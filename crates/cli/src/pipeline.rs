//! Acquisition orchestrator and batch driver.
//!
//! Per-identifier state machine: cache check, concurrent content and
//! metadata fetch on a miss, artifact write, registry upsert and save,
//! then link distribution. Identifiers in a batch run strictly one at a
//! time; the only concurrency is the content/metadata fetch pair inside
//! one identifier.

use transcache_client::{ContentFetcher, VideoMetadata};
use transcache_core::{
    artifact, registry, Entry, Error, LinkStore, Registry, RegistryStore,
};

/// Fallback channel when metadata cannot be fetched.
const FALLBACK_CHANNEL: &str = "Unknown Channel";

/// Fallback title when metadata cannot be fetched.
const FALLBACK_TITLE: &str = "Unknown Title";

/// Watch URL prefix used to derive locators from identifiers.
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Result of processing one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Entry and artifact already present; only the link was refreshed.
    CacheHit,
    /// Fetched, persisted, and linked.
    Fetched,
}

/// Aggregated results for one batch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub fetched: usize,
    pub cache_hits: usize,
    pub failed: usize,
    /// Set when an unauthorized error terminated the run early.
    pub aborted: bool,
}

/// Per-identifier acquisition pipeline.
///
/// Owns the registry for the lifetime of a batch; every mutation is
/// saved through the store before the next identifier starts.
pub struct Pipeline<'a, F: ContentFetcher> {
    store: &'a mut RegistryStore,
    registry: Registry,
    fetcher: &'a F,
    links: &'a dyn LinkStore,
}

impl<'a, F: ContentFetcher> Pipeline<'a, F> {
    pub fn new(
        store: &'a mut RegistryStore, registry: Registry, fetcher: &'a F, links: &'a dyn LinkStore,
    ) -> Self {
        Self { store, registry, fetcher, links }
    }

    /// Locator for an identifier.
    pub fn locator_for(id: &str) -> String {
        format!("{WATCH_URL_PREFIX}{id}")
    }

    /// Run the per-identifier state machine.
    pub async fn process_one(&mut self, id: &str, locator: &str) -> Result<Outcome, Error> {
        registry::validate_identifier(id)?;

        // Cache check: a registry entry only counts when its artifact is
        // on disk; anything else re-acquires, healing partial failures.
        if self.store.entry_exists(id).await? {
            let entry = self
                .store
                .get_entry(id)
                .await?
                .ok_or_else(|| Error::SchemaViolation(format!("{id}: entry vanished mid-check")))?;
            let filename = artifact::artifact_filename(id, Some(&entry.title));
            self.distribute(id, &filename);
            tracing::debug!(id, "cache hit");
            return Ok(Outcome::CacheHit);
        }
        if self.registry.contains(id) {
            tracing::warn!(id, "registry entry has no backing artifact, re-acquiring");
        }

        // Miss: content and metadata fetch run concurrently. Metadata
        // failure is absorbed into fallbacks; content failure propagates.
        let (content, metadata) = tokio::join!(
            self.fetcher.fetch_transcript(id, locator),
            self.fetcher.fetch_metadata(id, locator)
        );
        let content = content?;
        let metadata = metadata.unwrap_or_else(|e| {
            tracing::debug!(id, error = %e, "metadata fetch failed, using fallbacks");
            VideoMetadata { channel: FALLBACK_CHANNEL.into(), title: FALLBACK_TITLE.into() }
        });

        // Persist: artifact write happens-before the registry update.
        let channel = artifact::normalize_title(&metadata.channel);
        let title = artifact::normalize_title(&metadata.title);
        let filename = artifact::artifact_filename(id, Some(&title));
        let path = self.store.artifacts_dir().join(&filename);

        let header = artifact::ArtifactHeader {
            channel: channel.clone(),
            title: title.clone(),
            video_id: id.to_string(),
            url: locator.to_string(),
        };
        artifact::write_artifact(&path, Some(&header), &content).await?;

        self.registry.upsert(
            id.to_string(),
            Entry { acquired_at: registry::timestamp_now(), channel, title },
        );
        self.store.save(&self.registry).await?;

        self.distribute(id, &filename);
        tracing::info!(id, filename, "acquired");
        Ok(Outcome::Fetched)
    }

    /// Request link creation. Failures are reported, never fatal.
    fn distribute(&self, id: &str, filename: &str) {
        if let Err(e) = self.links.create_link(id, filename) {
            tracing::warn!(id, error = %e, "link creation failed");
        }
    }

    /// Process identifiers strictly in input order.
    ///
    /// Per-identifier failures print one readable line and advance to the
    /// next identifier; an unauthorized error aborts the remainder.
    pub async fn process_batch(&mut self, ids: &[String]) -> BatchSummary {
        let mut summary = BatchSummary { total: ids.len(), ..Default::default() };

        for id in ids {
            let locator = Self::locator_for(id);
            match self.process_one(id, &locator).await {
                Ok(Outcome::Fetched) => summary.fetched += 1,
                Ok(Outcome::CacheHit) => summary.cache_hits += 1,
                Err(e) => {
                    summary.failed += 1;
                    eprintln!("{id}: {}: {e}", e.kind());
                    if e.is_fatal() {
                        tracing::error!(id, error = %e, "fatal error, aborting batch");
                        summary.aborted = true;
                        break;
                    }
                }
            }
        }

        summary
    }

    /// Hand the registry back at end of batch.
    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use transcache_client::FetchError;
    use transcache_core::links::NullLinkStore;

    /// Scripted fetcher: counts calls, returns canned results.
    struct MockFetcher {
        content: Result<String, FetchError>,
        metadata: Result<VideoMetadata, FetchError>,
        content_calls: AtomicUsize,
    }

    impl MockFetcher {
        fn ok(content: &str, channel: &str, title: &str) -> Self {
            Self {
                content: Ok(content.to_string()),
                metadata: Ok(VideoMetadata { channel: channel.into(), title: title.into() }),
                content_calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: FetchError) -> Self {
            Self {
                content: Err(err),
                metadata: Ok(VideoMetadata { channel: "c".into(), title: "t".into() }),
                content_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentFetcher for MockFetcher {
        async fn fetch_transcript(&self, _id: &str, _locator: &str) -> Result<String, FetchError> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            self.content.clone()
        }

        async fn fetch_metadata(&self, _id: &str, _locator: &str) -> Result<VideoMetadata, FetchError> {
            self.metadata.clone()
        }
    }

    fn store_in(dir: &Path) -> RegistryStore {
        RegistryStore::new(dir.join("registry.json"), dir.to_path_buf(), 100)
    }

    #[tokio::test]
    async fn test_fetch_persists_artifact_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::ok("hello world", "Some Channel", "My Video!");
        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);

        let outcome = pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Fetched);

        let artifact_path = dir.path().join("tr_dQw4w9WgXcQ_my_video.md");
        let body = tokio::fs::read_to_string(&artifact_path).await.unwrap();
        assert!(body.contains("Channel: some_channel"));
        assert!(body.contains("Title: my_video"));
        assert!(body.contains("Video ID: dQw4w9WgXcQ"));
        assert!(body.ends_with("hello world"));

        let registry = pipeline.into_registry();
        let entry = registry.get("dQw4w9WgXcQ").unwrap();
        assert_eq!(entry.channel, "some_channel");
        assert_eq!(entry.title, "my_video");
        assert!(transcache_core::registry::is_valid_timestamp(&entry.acquired_at));
    }

    #[tokio::test]
    async fn test_second_run_is_pure_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::ok("hello world", "Some Channel", "My Video!");

        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        let artifact_before =
            tokio::fs::read_to_string(dir.path().join("tr_dQw4w9WgXcQ_my_video.md")).await.unwrap();

        let outcome = pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::CacheHit);
        // Exactly one fetch across both runs.
        assert_eq!(fetcher.content_calls.load(Ordering::SeqCst), 1);

        let artifact_after =
            tokio::fs::read_to_string(dir.path().join("tr_dQw4w9WgXcQ_my_video.md")).await.unwrap();
        assert_eq!(artifact_before, artifact_after);
    }

    #[tokio::test]
    async fn test_entry_without_artifact_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::ok("hello world", "Some Channel", "My Video!");

        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        // Artifact gone but entry persists: the next run must re-fetch.
        tokio::fs::remove_file(dir.path().join("tr_dQw4w9WgXcQ_my_video.md")).await.unwrap();
        let outcome = pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Fetched);
        assert_eq!(fetcher.content_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_uses_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher {
            content: Ok("hello world".into()),
            metadata: Err(FetchError::Timeout),
            content_calls: AtomicUsize::new(0),
        };

        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        let registry = pipeline.into_registry();
        let entry = registry.get("dQw4w9WgXcQ").unwrap();
        assert_eq!(entry.channel, "unknown_channel");
        assert_eq!(entry.title, "unknown_title");
        assert!(dir.path().join("tr_dQw4w9WgXcQ_unknown_title.md").exists());
    }

    #[tokio::test]
    async fn test_content_failure_leaves_registry_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::failing(FetchError::ServerError { status: 503 });

        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        let result = pipeline
            .process_one("dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await;

        assert!(matches!(result, Err(Error::ServerError(_))));
        assert!(pipeline.into_registry().is_empty());
        assert!(!dir.path().join("registry.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_identifier_rejected_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::ok("x", "c", "t");

        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        let result = pipeline.process_one("too-short", "https://example.com").await;

        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(fetcher.content_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_continues_past_per_identifier_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::ok("hello", "c", "t");

        let ids = vec!["bad id here".to_string(), "dQw4w9WgXcQ".to_string()];
        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        let summary = pipeline.process_batch(&ids).await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.fetched, 1);
        assert!(!summary.aborted);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let fetcher = MockFetcher::failing(FetchError::Unauthorized("bad key".into()));

        let ids = vec!["aaaaaaaaaaa".to_string(), "bbbbbbbbbbb".to_string()];
        let mut pipeline = Pipeline::new(&mut store, Registry::default(), &fetcher, &NullLinkStore);
        let summary = pipeline.process_batch(&ids).await;

        assert!(summary.aborted);
        assert_eq!(summary.failed, 1);
        // The second identifier was never attempted.
        assert_eq!(fetcher.content_calls.load(Ordering::SeqCst), 1);
    }
}
