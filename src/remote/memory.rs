//! In-process remote index.
//!
//! Behaves like a write-protected hosted index: reads work with any
//! connected search key, writes need a session bound to the admin key.
//! Reachability and per-id write failures can be toggled, which makes it
//! the remote of choice for exercising the sync service.

use super::credentials::{ElevatedSession, ReadCredential, WriteCredential};
use super::trait_def::{ConnectOutcome, RemoteError, RemoteIndex, RemoteResult, SearchOptions};
use crate::catalog::CatalogRecord;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

struct IndexState {
    records: Vec<CatalogRecord>,
    reachable: bool,
    write_protected: bool,
    admin_key: String,
    connected: bool,
    failing_ids: HashSet<String>,
    active_sessions: usize,
    elevations: usize,
}

pub struct InMemoryIndex {
    state: Mutex<IndexState>,
}

impl InMemoryIndex {
    /// A reachable, write-protected index accepting `admin_key` for writes.
    pub fn new(admin_key: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(IndexState {
                records: Vec::new(),
                reachable: true,
                write_protected: true,
                admin_key: admin_key.into(),
                connected: false,
                failing_ids: HashSet::new(),
                active_sessions: 0,
                elevations: 0,
            }),
        }
    }

    pub fn with_records(admin_key: impl Into<String>, records: Vec<CatalogRecord>) -> Self {
        let index = Self::new(admin_key);
        index.lock().records = records;
        index
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// When false, writes with the read key are accepted.
    pub fn set_write_protected(&self, write_protected: bool) {
        self.lock().write_protected = write_protected;
    }

    /// Make writes of `id` fail as if the index went away mid-operation.
    pub fn fail_writes_for(&self, id: impl Into<String>) {
        self.lock().failing_ids.insert(id.into());
    }

    /// Snapshot of the stored records, hidden included.
    pub fn records(&self) -> Vec<CatalogRecord> {
        self.lock().records.clone()
    }

    pub fn get(&self, id: &str) -> Option<CatalogRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Change the index behind the service's back.
    pub fn insert_directly(&self, record: CatalogRecord) {
        upsert(&mut self.lock().records, record);
    }

    pub fn remove_directly(&self, id: &str) {
        self.lock().records.retain(|r| r.id != id);
    }

    /// Sessions elevated but not yet released.
    pub fn active_sessions(&self) -> usize {
        self.lock().active_sessions
    }

    /// Total sessions ever elevated.
    pub fn elevations(&self) -> usize {
        self.lock().elevations
    }
}

fn upsert(records: &mut Vec<CatalogRecord>, record: CatalogRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

impl IndexState {
    fn check_readable(&self) -> RemoteResult<()> {
        if !self.reachable {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        if !self.connected {
            return Err(RemoteError::Unavailable(
                "not connected to the remote index".to_string(),
            ));
        }
        Ok(())
    }

    fn check_writable(&self, session: Option<&ElevatedSession>) -> RemoteResult<()> {
        self.check_readable()?;
        match session {
            Some(session) if session.credential().expose() != self.admin_key => Err(
                RemoteError::PermissionDenied("invalid admin API key".to_string()),
            ),
            None if self.write_protected => Err(RemoteError::PermissionDenied(
                "search key cannot write".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn check_not_failing(&self, id: &str) -> RemoteResult<()> {
        if self.failing_ids.contains(id) {
            return Err(RemoteError::Unavailable(format!("write of '{}' failed", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteIndex for InMemoryIndex {
    async fn connect(&self, credential: ReadCredential) -> ConnectOutcome {
        let mut state = self.lock();
        if credential.is_empty() {
            return ConnectOutcome::Unreachable("search key is not configured".to_string());
        }
        if !state.reachable {
            return ConnectOutcome::Unreachable("connection refused".to_string());
        }
        state.connected = true;
        ConnectOutcome::Connected
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> RemoteResult<Vec<CatalogRecord>> {
        let state = self.lock();
        state.check_readable()?;
        let query = query.trim().to_lowercase();
        Ok(state
            .records
            .iter()
            .filter(|r| options.include_hidden || !r.hidden)
            .filter(|r| query.is_empty() || r.searchable_text.to_lowercase().contains(&query))
            .take(options.effective_hits_per_page(&query))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> RemoteResult<Option<CatalogRecord>> {
        let state = self.lock();
        state.check_readable()?;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn elevate(&self, credential: WriteCredential) -> RemoteResult<ElevatedSession> {
        if credential.expose().trim().is_empty() {
            return Err(RemoteError::PermissionDenied(
                "write credential is empty".to_string(),
            ));
        }
        let mut state = self.lock();
        state.active_sessions += 1;
        state.elevations += 1;
        Ok(ElevatedSession::new(credential))
    }

    async fn write(
        &self,
        record: &CatalogRecord,
        session: Option<&ElevatedSession>,
    ) -> RemoteResult<CatalogRecord> {
        let mut state = self.lock();
        state.check_writable(session)?;
        state.check_not_failing(&record.id)?;
        upsert(&mut state.records, record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, id: &str, session: Option<&ElevatedSession>) -> RemoteResult<()> {
        let mut state = self.lock();
        state.check_writable(session)?;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        if state.records.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn batch_write(
        &self,
        records: &[CatalogRecord],
        session: &ElevatedSession,
    ) -> RemoteResult<Vec<CatalogRecord>> {
        let mut state = self.lock();
        state.check_writable(Some(session))?;
        for record in records {
            state.check_not_failing(&record.id)?;
        }
        for record in records {
            upsert(&mut state.records, record.clone());
        }
        Ok(records.to_vec())
    }

    fn release(&self, _session: ElevatedSession) {
        let mut state = self.lock();
        state.active_sessions = state.active_sessions.saturating_sub(1);
    }
}
