//! LocalCacheStore trait definition.
//!
//! The cache holds the last known-good catalog snapshot. It is synchronous
//! and never touches the network.

use crate::catalog::CatalogRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache snapshot could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache schema error: {0}")]
    Schema(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Durable storage for the catalog snapshot.
///
/// Every read returns owned records, so callers never alias the stored
/// snapshot.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait LocalCacheStore: Send + Sync {
    /// Load the whole snapshot. Empty when nothing was stored yet.
    fn load_all(&self) -> CacheResult<Vec<CatalogRecord>>;

    /// Atomically overwrite the whole snapshot.
    fn replace_all(&self, records: &[CatalogRecord]) -> CacheResult<()>;

    /// Insert or replace one record by id.
    fn upsert(&self, record: &CatalogRecord) -> CacheResult<()>;

    /// Remove one record by id. No-op when absent.
    fn remove(&self, id: &str) -> CacheResult<()>;

    fn len(&self) -> CacheResult<usize>;

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}
