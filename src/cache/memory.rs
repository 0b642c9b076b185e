//! In-process cache store.
//!
//! Used where no durable file is wanted, and by tests that need to make the
//! cache fail on demand.

use super::trait_def::{CacheError, CacheResult, LocalCacheStore};
use crate::catalog::CatalogRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryCacheStore {
    records: Mutex<Vec<CatalogRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CatalogRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent mutation fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> CacheResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "cache storage quota exceeded",
            )));
        }
        Ok(())
    }

    fn with_records_mut<T>(&self, f: impl FnOnce(&mut Vec<CatalogRecord>) -> T) -> T {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut records)
    }
}

impl LocalCacheStore for MemoryCacheStore {
    fn load_all(&self) -> CacheResult<Vec<CatalogRecord>> {
        Ok(self.with_records_mut(|records| records.clone()))
    }

    fn replace_all(&self, records: &[CatalogRecord]) -> CacheResult<()> {
        self.check_writable()?;
        self.with_records_mut(|stored| *stored = records.to_vec());
        Ok(())
    }

    fn upsert(&self, record: &CatalogRecord) -> CacheResult<()> {
        self.check_writable()?;
        self.with_records_mut(|records| {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        });
        Ok(())
    }

    fn remove(&self, id: &str) -> CacheResult<()> {
        self.check_writable()?;
        self.with_records_mut(|records| records.retain(|r| r.id != id));
        Ok(())
    }

    fn len(&self) -> CacheResult<usize> {
        Ok(self.with_records_mut(|records| records.len()))
    }
}
