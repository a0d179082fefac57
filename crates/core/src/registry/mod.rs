//! Persistent registry types.
//!
//! The registry is the canonical identifier-to-metadata mapping. Keys are
//! 11-character video identifiers; values carry exactly the current
//! schema's field set (`acquired_at`, `channel`, `title`). An obsolete
//! prior schema (`date_added` plus a `links` array) is accepted on read
//! only and repaired by the migration engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Error;

pub mod migration;
pub mod store;

pub use store::RegistryStore;

/// Exact length of a content identifier.
pub const IDENTIFIER_LEN: usize = 11;

/// Maximum length of a stored channel name.
pub const MAX_CHANNEL_LEN: usize = 200;

/// Maximum length of a stored title.
pub const MAX_TITLE_LEN: usize = 500;

/// Validate an identifier: exactly 11 characters drawn from
/// letters, digits, underscore, and dash.
pub fn validate_identifier(id: &str) -> Result<(), Error> {
    if id.len() != IDENTIFIER_LEN {
        return Err(Error::InvalidRequest(format!(
            "identifier {id:?} must be exactly {IDENTIFIER_LEN} characters"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(Error::InvalidRequest(format!(
            "identifier {id:?} contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

/// Current acquisition timestamp, fixed-width and lexicographically
/// sortable (`YYMMDDTHHMM`).
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%y%m%dT%H%M").to_string()
}

/// Check a timestamp matches the fixed-width `YYMMDDTHHMM` shape.
pub fn is_valid_timestamp(ts: &str) -> bool {
    let bytes = ts.as_bytes();
    bytes.len() == 11
        && bytes[..6].iter().all(u8::is_ascii_digit)
        && bytes[6] == b'T'
        && bytes[7..].iter().all(u8::is_ascii_digit)
}

/// One persisted registry entry (current schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    /// Fixed-width acquisition timestamp (`YYMMDDTHHMM`).
    pub acquired_at: String,
    /// Normalized channel name, non-empty, at most 200 chars.
    pub channel: String,
    /// Normalized title, non-empty, at most 500 chars.
    pub title: String,
}

impl Entry {
    /// Structural validation against the current schema.
    pub fn validate(&self) -> Result<(), Error> {
        if !is_valid_timestamp(&self.acquired_at) {
            return Err(Error::SchemaViolation(format!(
                "acquired_at {:?} is not a YYMMDDTHHMM timestamp",
                self.acquired_at
            )));
        }
        if self.channel.is_empty() || self.channel.chars().count() > MAX_CHANNEL_LEN {
            return Err(Error::SchemaViolation(format!(
                "channel must be non-empty and at most {MAX_CHANNEL_LEN} chars"
            )));
        }
        if self.title.is_empty() || self.title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::SchemaViolation(format!(
                "title must be non-empty and at most {MAX_TITLE_LEN} chars"
            )));
        }
        Ok(())
    }
}

/// Obsolete registry entry shape, accepted on read only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEntry {
    /// Date-only acquisition timestamp (`YYYY-MM-DD`).
    pub date_added: String,
    /// Distribution link paths; dropped by migration.
    #[serde(default)]
    pub links: Vec<String>,
}

/// Complete identifier-to-entry mapping.
///
/// Backed by a `BTreeMap` so serialization order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace the entry for `id`.
    pub fn upsert(&mut self, id: String, entry: Entry) {
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<Entry> {
        self.entries.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every key and entry against the current schema.
    pub fn validate(&self) -> Result<(), Error> {
        for (id, entry) in &self.entries {
            validate_identifier(id)
                .map_err(|e| Error::SchemaViolation(format!("bad registry key: {e}")))?;
            entry
                .validate()
                .map_err(|e| Error::SchemaViolation(format!("{id}: {e}")))?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Entry)> for Registry {
    fn from_iter<T: IntoIterator<Item = (String, Entry)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
