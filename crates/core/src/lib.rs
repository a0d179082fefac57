//! Core types and shared functionality for transcache.
//!
//! This crate provides:
//! - Crash-safe persistent registry with atomic writes
//! - Schema migration engine for obsolete registry shapes
//! - Bounded LRU acceleration cache with write-window invalidation
//! - Integrity sweep for orphaned entries
//! - Unified error taxonomy and layered configuration

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod links;
pub mod registry;
pub mod sweep;

pub use cache::{AccelerationCache, EntryMeta};
pub use config::AppConfig;
pub use error::Error;
pub use links::LinkStore;
pub use registry::{Entry, Registry, RegistryStore};
pub use sweep::SweepReport;
