//! SQLite-backed local cache.

use super::schema::{CACHE_VERSIONED_SCHEMAS, SNAPSHOT_KEY};
use super::trait_def::{CacheError, CacheResult, LocalCacheStore};
use crate::catalog::CatalogRecord;
use crate::sqlite_persistence::migrate_if_needed;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Local cache persisted in a SQLite file.
///
/// Each operation runs in its own transaction, so a snapshot is never
/// observed half-written.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

fn read_snapshot(tx: &Transaction) -> CacheResult<Vec<CatalogRecord>> {
    let value: Option<String> = tx
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![SNAPSHOT_KEY],
            |r| r.get(0),
        )
        .optional()?;
    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn write_snapshot(tx: &Transaction, records: &[CatalogRecord]) -> CacheResult<()> {
    let json = serde_json::to_string(records)?;
    tx.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![SNAPSHOT_KEY, json, chrono::Utc::now().timestamp()],
    )?;
    Ok(())
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> CacheResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::from_connection(conn)?;
        info!(
            "Opened local cache at {:?} with {} records",
            db_path,
            store.len()?
        );
        Ok(store)
    }

    /// A cache that lives only as long as the process.
    pub fn in_memory() -> CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> CacheResult<Self> {
        migrate_if_needed(&mut conn, CACHE_VERSIONED_SCHEMAS)
            .map_err(|e| CacheError::Schema(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` on the snapshot inside one transaction and store the result.
    fn modify_snapshot<F>(&self, f: F) -> CacheResult<()>
    where
        F: FnOnce(&mut Vec<CatalogRecord>),
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut records = read_snapshot(&tx)?;
        f(&mut records);
        write_snapshot(&tx, &records)?;
        tx.commit()?;
        Ok(())
    }
}

impl LocalCacheStore for SqliteCacheStore {
    fn load_all(&self) -> CacheResult<Vec<CatalogRecord>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let records = read_snapshot(&tx)?;
        Ok(records)
    }

    fn replace_all(&self, records: &[CatalogRecord]) -> CacheResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        write_snapshot(&tx, records)?;
        tx.commit()?;
        debug!("Replaced cache snapshot with {} records", records.len());
        Ok(())
    }

    fn upsert(&self, record: &CatalogRecord) -> CacheResult<()> {
        self.modify_snapshot(|records| {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        })
    }

    fn remove(&self, id: &str) -> CacheResult<()> {
        self.modify_snapshot(|records| records.retain(|r| r.id != id))
    }

    fn len(&self) -> CacheResult<usize> {
        Ok(self.load_all()?.len())
    }
}
