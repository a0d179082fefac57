//! Schema migration engine for obsolete registry shapes.
//!
//! Migration runs in four gated phases: backup, transform, validate,
//! install. The canonical file is only touched in the install phase, via
//! the atomic save path, and the pre-migration backup is restored over it
//! if install fails. Validation failure of any single entry fails the
//! whole migration; partial application is never left on disk.
//!
//! Legacy artifact filenames (`<id>.md`) are renamed to the current
//! naming scheme under an advisory lock file so two processes cannot
//! migrate concurrently. Completed renames are logged for audit and
//! rolled back in reverse order, best effort, when a later step fails.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact;
use crate::registry::{store::RegistryStore, Entry, LegacyEntry, Registry};
use crate::Error;

/// Advisory lock file name, kept under the artifacts directory.
pub const LOCK_FILE_NAME: &str = ".migration.lock";

/// Audit log of artifact renames performed by migrations.
pub const RENAME_LOG_NAME: &str = "migration_renames.log";

/// Fallback channel recorded for entries the obsolete schema never
/// captured one for (normalized form of "Unknown Channel").
pub const FALLBACK_CHANNEL: &str = "unknown_channel";

/// Fallback title (normalized form of "Unknown Title").
pub const FALLBACK_TITLE: &str = "unknown_title";

/// Contents of the advisory lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    started_at: String,
    pid: u32,
}

/// Outcome of a completed migration.
#[derive(Debug)]
pub struct MigrationReport {
    /// Entries converted to the current schema.
    pub migrated: usize,
    /// Legacy artifacts renamed to the current naming scheme.
    pub renamed_artifacts: usize,
    /// Where the pre-migration backup lives. Never auto-deleted.
    pub backup_path: PathBuf,
}

/// Whether a parsed registry map is in the obsolete shape.
pub fn needs_migration(map: &serde_json::Map<String, Value>) -> bool {
    map.values()
        .any(|value| value.as_object().is_some_and(|obj| obj.contains_key("date_added")))
}

/// Migrate a registry map from the obsolete shape to the current one.
///
/// # Errors
///
/// Fails with `Migration` when another migration holds the lock, the
/// backup cannot be written, any entry fails transform or validation
/// (full rollback), or the install phase fails (backup restored first).
pub async fn migrate(
    store: &mut RegistryStore, map: &serde_json::Map<String, Value>,
) -> Result<(Registry, MigrationReport), Error> {
    let lock_path = store.artifacts_dir().join(LOCK_FILE_NAME);
    acquire_lock(&lock_path).await?;

    let result = migrate_locked(store, map).await;

    // The lock is advisory only; always release it, even on failure.
    if let Err(e) = tokio::fs::remove_file(&lock_path).await {
        tracing::warn!(path = %lock_path.display(), error = %e, "failed to remove migration lock");
    }

    result
}

async fn migrate_locked(
    store: &mut RegistryStore, map: &serde_json::Map<String, Value>,
) -> Result<(Registry, MigrationReport), Error> {
    // Phase 1: backup. Nothing proceeds without a verified copy.
    let backup_path = backup_registry(store.registry_path()).await?;

    // Phase 2: transform. A failing entry is kept in its original shape
    // and its error recorded; it is never silently dropped.
    let mut registry = Registry::default();
    let mut errors: Vec<String> = Vec::new();
    let mut kept_original = 0usize;

    for (id, value) in map {
        match transform_entry(value) {
            Ok(entry) => registry.upsert(id.clone(), entry),
            Err(e) => {
                kept_original += 1;
                errors.push(format!("{id}: {e}"));
            }
        }
    }

    // Phase 3: validate. Any entry failing the current schema fails the
    // migration as a whole; entries kept in the original shape cannot
    // pass, so their presence fails it too. The canonical file has not
    // been touched, which is the rollback.
    if kept_original > 0 {
        return Err(Error::Migration(format!(
            "{kept_original} entries could not be transformed: {}",
            errors.join("; ")
        )));
    }
    registry
        .validate()
        .map_err(|e| Error::Migration(format!("transformed registry failed validation: {e}")))?;

    // Rename legacy artifacts before install so a crash between the two
    // leaves entries pointing at renamed files recoverable from the log.
    let renames = rename_legacy_artifacts(store.artifacts_dir(), &registry).await?;

    // Phase 4: install. On failure, restore the backup and undo renames.
    if let Err(install_err) = store.save(&registry).await {
        tracing::error!(error = %install_err, "migration install failed, restoring backup");
        if let Err(e) = tokio::fs::copy(&backup_path, store.registry_path()).await {
            tracing::error!(
                backup = %backup_path.display(),
                error = %e,
                "backup restore failed; backup file retained"
            );
        }
        rollback_renames(&renames).await;
        return Err(install_err);
    }

    let report = MigrationReport {
        migrated: registry.len(),
        renamed_artifacts: renames.len(),
        backup_path,
    };
    Ok((registry, report))
}

/// Transform one raw entry value into the current schema.
///
/// Legacy entries get their date-only timestamp widened with a default
/// time and synthesized fallback channel/title; the obsolete `links`
/// array is dropped. Entries already in the current shape pass through.
fn transform_entry(value: &Value) -> Result<Entry, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::SchemaViolation("entry is not an object".into()))?;

    if !obj.contains_key("date_added") {
        return serde_json::from_value::<Entry>(value.clone())
            .map_err(|e| Error::SchemaViolation(format!("not current schema: {e}")));
    }

    let legacy: LegacyEntry = serde_json::from_value(value.clone())
        .map_err(|e| Error::SchemaViolation(format!("not legacy schema: {e}")))?;

    let date = chrono::NaiveDate::parse_from_str(&legacy.date_added, "%Y-%m-%d")
        .map_err(|e| Error::SchemaViolation(format!("bad date_added {:?}: {e}", legacy.date_added)))?;

    Ok(Entry {
        // Default time of day when the legacy record carried none.
        acquired_at: format!("{}T0000", date.format("%y%m%d")),
        channel: FALLBACK_CHANNEL.to_string(),
        title: FALLBACK_TITLE.to_string(),
    })
}

/// Take the advisory migration lock, failing fast if one is held.
async fn acquire_lock(lock_path: &Path) -> Result<(), Error> {
    if tokio::fs::metadata(lock_path).await.is_ok() {
        return Err(Error::Migration(format!(
            "migration already in progress (lock file {} exists)",
            lock_path.display()
        )));
    }

    if let Some(parent) = lock_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Filesystem(format!("failed to create {}: {}", parent.display(), e)))?;
    }

    let info = LockInfo {
        started_at: chrono::Utc::now().to_rfc3339(),
        pid: std::process::id(),
    };
    let body = serde_json::to_string(&info)
        .map_err(|e| Error::Migration(format!("failed to serialize lock info: {e}")))?;
    tokio::fs::write(lock_path, body)
        .await
        .map_err(|e| Error::Filesystem(format!("failed to write {}: {}", lock_path.display(), e)))
}

/// Copy the canonical file to a timestamped backup path.
async fn backup_registry(registry_path: &Path) -> Result<PathBuf, Error> {
    let suffix = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let mut os = registry_path.as_os_str().to_os_string();
    os.push(format!(".backup.{suffix}"));
    let backup_path = PathBuf::from(os);

    tokio::fs::copy(registry_path, &backup_path).await.map_err(|e| {
        Error::Migration(format!("backup to {} failed: {}", backup_path.display(), e))
    })?;

    Ok(backup_path)
}

/// Rename legacy-named artifacts (`<id>.md`) to the current scheme.
///
/// Each completed rename is appended to the audit log. A failing rename
/// triggers a best-effort reverse-order rollback of the ones already
/// done, then propagates.
async fn rename_legacy_artifacts(
    artifacts_dir: &Path, registry: &Registry,
) -> Result<Vec<(PathBuf, PathBuf)>, Error> {
    let mut completed: Vec<(PathBuf, PathBuf)> = Vec::new();

    for (id, entry) in registry.iter() {
        let old_path = artifacts_dir.join(format!("{id}.md"));
        if tokio::fs::metadata(&old_path).await.is_err() {
            continue;
        }
        let new_path = artifact::artifact_path(artifacts_dir, id, Some(&entry.title));

        if let Err(e) = tokio::fs::rename(&old_path, &new_path).await {
            tracing::error!(
                from = %old_path.display(),
                to = %new_path.display(),
                error = %e,
                "artifact rename failed, rolling back completed renames"
            );
            rollback_renames(&completed).await;
            return Err(Error::Migration(format!(
                "failed to rename {}: {}",
                old_path.display(),
                e
            )));
        }
        completed.push((old_path, new_path));
    }

    if !completed.is_empty() {
        append_rename_log(artifacts_dir, &completed).await;
    }

    Ok(completed)
}

/// Undo completed renames in reverse order, best effort.
async fn rollback_renames(completed: &[(PathBuf, PathBuf)]) {
    for (old_path, new_path) in completed.iter().rev() {
        if let Err(e) = tokio::fs::rename(new_path, old_path).await {
            tracing::warn!(
                from = %new_path.display(),
                to = %old_path.display(),
                error = %e,
                "rename rollback failed"
            );
        }
    }
}

/// Append completed renames to the audit log. Best effort.
async fn append_rename_log(artifacts_dir: &Path, completed: &[(PathBuf, PathBuf)]) {
    let log_path = artifacts_dir.join(RENAME_LOG_NAME);
    let mut lines = String::new();
    for (old_path, new_path) in completed {
        lines.push_str(&format!("{} -> {}\n", old_path.display(), new_path.display()));
    }

    let existing = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
    if let Err(e) = tokio::fs::write(&log_path, format!("{existing}{lines}")).await {
        tracing::warn!(path = %log_path.display(), error = %e, "failed to write rename log");
    }
}
