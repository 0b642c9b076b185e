mod memory;
mod schema;
mod sqlite_store;
mod trait_def;

pub use memory::MemoryCacheStore;
pub use schema::{CACHE_VERSIONED_SCHEMAS, SNAPSHOT_KEY};
pub use sqlite_store::SqliteCacheStore;
pub use trait_def::{CacheError, CacheResult, LocalCacheStore};

#[cfg(feature = "mock")]
pub use trait_def::MockLocalCacheStore;
