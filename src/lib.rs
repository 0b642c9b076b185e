//! Session Chords Library
//!
//! Chord-chart catalog kept in sync between a hosted search index and a
//! local SQLite cache. The binaries are thin clients of [`CatalogSyncService`].

pub mod cache;
pub mod catalog;
pub mod cli_prompt;
pub mod cli_style;
pub mod config;
pub mod migration;
pub mod remote;
pub mod sqlite_persistence;
pub mod sync;

// Re-export commonly used types for convenience
pub use cache::{LocalCacheStore, SqliteCacheStore};
pub use catalog::{CatalogRecord, RecordDraft};
pub use remote::{AlgoliaConfig, AlgoliaIndexClient, RemoteIndex};
pub use sync::{CatalogError, CatalogEvent, CatalogSyncService, CredentialProvider, SyncOutcome};
