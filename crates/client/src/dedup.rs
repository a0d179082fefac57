//! In-flight call deduplication.
//!
//! Concurrent calls for the same key share one execution: the second
//! caller waits on the first's cell and receives a clone of its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// Single-flight map keyed by identifier.
#[derive(Debug, Default)]
pub(crate) struct Inflight<T> {
    calls: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> Inflight<T> {
    pub fn new() -> Self {
        Self { calls: Mutex::new(HashMap::new()) }
    }

    /// Run `op` for `key`, joining an in-flight execution if one exists.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut calls = self.calls.lock().await;
            calls.entry(key.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let value = cell.get_or_init(op).await.clone();

        // Completed calls leave the map so a later fetch re-executes.
        self.release(key, &cell).await;

        value
    }

    /// Remove the map entry for `key`, but only if it still holds `cell`.
    ///
    /// A waiter resuming after its call completed may find the key
    /// occupied by a newer in-flight cell; removing that one would let a
    /// fourth caller start a second concurrent execution.
    async fn release(&self, key: &str, cell: &Arc<OnceCell<T>>) {
        let mut calls = self.calls.lock().await;
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, cell)) {
            calls.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let inflight: Arc<Inflight<u32>> = Arc::new(Inflight::new());
        let executions = Arc::new(AtomicU32::new(0));

        // Yielding inside the operation keeps it in flight while the
        // second caller arrives and joins the same cell.
        let call = |inflight: Arc<Inflight<u32>>, executions: Arc<AtomicU32>| async move {
            inflight
                .run("dQw4w9WgXcQ", || async move {
                    tokio::task::yield_now().await;
                    executions.fetch_add(1, Ordering::SeqCst)
                })
                .await
        };

        let (a, b) = tokio::join!(
            call(inflight.clone(), executions.clone()),
            call(inflight.clone(), executions.clone())
        );

        assert_eq!(a, b);
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_re_execute() {
        let inflight: Inflight<u32> = Inflight::new();
        let executions = AtomicU32::new(0);
        let executions = &executions;

        let first =
            inflight.run("k", || async move { executions.fetch_add(1, Ordering::SeqCst) }).await;
        let second =
            inflight.run("k", || async move { executions.fetch_add(1, Ordering::SeqCst) }).await;

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_late_waiter_does_not_evict_newer_cell() {
        let inflight: Inflight<u32> = Inflight::new();

        // A waiter from an earlier, completed call resumes while the map
        // already holds a fresh in-flight cell for the same key.
        let stale: Arc<OnceCell<u32>> = Arc::new(OnceCell::new());
        let current: Arc<OnceCell<u32>> = Arc::new(OnceCell::new());
        inflight.calls.lock().await.insert("dQw4w9WgXcQ".into(), current.clone());

        inflight.release("dQw4w9WgXcQ", &stale).await;
        let held = inflight.calls.lock().await.get("dQw4w9WgXcQ").cloned();
        assert!(held.is_some_and(|cell| Arc::ptr_eq(&cell, &current)));

        // The owning caller still cleans up after itself.
        inflight.release("dQw4w9WgXcQ", &current).await;
        assert!(inflight.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let inflight: Inflight<&'static str> = Inflight::new();
        let a = inflight.run("a", || async { "a" }).await;
        let b = inflight.run("b", || async { "b" }).await;
        assert_eq!((a, b), ("a", "b"));
    }
}
