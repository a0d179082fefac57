//! Integrity sweep: drop registry entries whose artifact is gone.
//!
//! Runs at defined lifecycle points (pre-batch). Per-entry problems are
//! collected into the report, never thrown, so one bad entry cannot
//! abort the rest. All removals land in a single registry save.

use crate::links::LinkStore;
use crate::registry::{Registry, RegistryStore};
use crate::Error;

/// Outcome of one integrity sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Entries examined.
    pub checked: usize,
    /// Entries removed because their artifact was missing.
    pub orphaned: usize,
    /// Per-entry problems encountered along the way.
    pub errors: Vec<String>,
}

/// Check every entry's backing artifact and remove orphans.
///
/// Orphaned entries have their distribution links removed first (cleanup
/// failures are recorded in the report, not fatal) and are then dropped
/// from the in-memory registry. The registry is saved exactly once, and
/// only when something was removed.
pub async fn validate_integrity(
    store: &mut RegistryStore, registry: &mut Registry, links: &dyn LinkStore,
) -> Result<SweepReport, Error> {
    let mut report = SweepReport::default();
    let mut orphans: Vec<String> = Vec::new();

    for (id, entry) in registry.iter() {
        report.checked += 1;

        if let Err(e) = entry.validate() {
            report.errors.push(format!("{id}: malformed entry: {e}"));
            continue;
        }

        let path = store.artifact_path_for(id, entry);
        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id = %id, path = %path.display(), "artifact missing, removing entry");
                orphans.push(id.clone());
            }
            Err(e) => {
                report.errors.push(format!("{id}: artifact check failed: {e}"));
            }
        }
    }

    for id in &orphans {
        match links.remove_links(id) {
            Ok(removed) if removed > 0 => {
                tracing::debug!(id = %id, removed, "removed distribution links for orphan");
            }
            Ok(_) => {}
            Err(e) => {
                report.errors.push(format!("{id}: link cleanup failed: {e}"));
            }
        }
        registry.remove(id);
    }

    report.orphaned = orphans.len();

    if !orphans.is_empty() {
        store.save(registry).await?;
    }

    Ok(report)
}
