//! Catalog synchronization service.
//!
//! Routes reads to the remote index while it is reachable and to the local
//! snapshot otherwise. Writes go through a [`WriteScope`] and are mirrored
//! into the in-memory view and the local cache before they are reported.

use super::elevation::{CredentialProvider, RemoteScopeError, WriteScope};
use super::error::CatalogError;
use super::events::{CatalogEvent, ChangeReason, ConnectionStatus, SyncOutcome};
use super::locks::IdLocks;
use crate::cache::LocalCacheStore;
use crate::catalog::{
    check_id_collision, derive_id, export_records, now_millis, parse_catalog_text,
    validate_batch, validate_record, CatalogRecord, RecordDraft, ValidationError,
};
use crate::remote::{ConnectOutcome, ReadCredential, RemoteError, RemoteIndex, SearchOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, RwLock as AsyncRwLock};
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct CatalogSyncService {
    remote: Arc<dyn RemoteIndex>,
    cache: Arc<dyn LocalCacheStore>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    read_credential: ReadCredential,
    remote_available: AtomicBool,
    /// Last known catalog, hidden records included.
    view: RwLock<Vec<CatalogRecord>>,
    events: broadcast::Sender<CatalogEvent>,
    id_locks: IdLocks,
    /// Shared by single-record writes, exclusive for batch and refresh.
    catalog_lock: AsyncRwLock<()>,
}

fn upsert_in(records: &mut Vec<CatalogRecord>, record: CatalogRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

impl CatalogSyncService {
    pub fn new(
        remote: Arc<dyn RemoteIndex>,
        cache: Arc<dyn LocalCacheStore>,
        read_credential: ReadCredential,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            remote,
            cache,
            credentials: None,
            read_credential,
            remote_available: AtomicBool::new(false),
            view: RwLock::new(Vec::new()),
            events,
            id_locks: IdLocks::new(),
            catalog_lock: AsyncRwLock::new(()),
        }
    }

    /// Set who is asked for a write credential when the remote refuses a
    /// write. Without one, `PermissionDenied` reaches the caller directly.
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub fn is_remote_available(&self) -> bool {
        self.remote_available.load(Ordering::SeqCst)
    }

    // =========================================================================
    // View helpers
    // =========================================================================

    fn view_snapshot(&self) -> Vec<CatalogRecord> {
        self.view
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn with_view<T>(&self, f: impl FnOnce(&mut Vec<CatalogRecord>) -> T) -> T {
        let mut view = self
            .view
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut view)
    }

    fn view_get(&self, id: &str) -> Option<CatalogRecord> {
        self.view
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    fn mark_offline(&self, reason: &str) {
        if self.remote_available.swap(false, Ordering::SeqCst) {
            warn!(reason, "Remote index unavailable, serving from local cache");
        }
    }

    fn emit(&self, reason: ChangeReason) {
        let records = self.view_snapshot();
        debug!(?reason, count = records.len(), "Catalog changed");
        // No receivers is fine.
        let _ = self.events.send(CatalogEvent::CatalogChanged { records, reason });
    }

    fn scope(&self, operation: String) -> WriteScope {
        WriteScope::new(self.remote.clone(), self.credentials.clone(), operation)
    }

    /// Mirror a remote upsert. Returns the durability warning, if any.
    fn mirror_upsert(&self, record: &CatalogRecord) -> Option<CatalogError> {
        self.with_view(|view| upsert_in(view, record.clone()));
        match self.cache.upsert(record) {
            Ok(()) => None,
            Err(e) => {
                warn!(id = %record.id, error = %e, "Failed to mirror write into local cache");
                Some(e.into())
            }
        }
    }

    fn mirror_remove(&self, id: &str) -> Option<CatalogError> {
        self.with_view(|view| view.retain(|r| r.id != id));
        match self.cache.remove(id) {
            Ok(()) => None,
            Err(e) => {
                warn!(id, error = %e, "Failed to mirror delete into local cache");
                Some(e.into())
            }
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Probe the remote and load the local snapshot.
    ///
    /// The snapshot is always loaded so fallback reads have data. When the
    /// remote is reachable, its full listing becomes the in-memory view.
    pub async fn initialize(&self) -> ConnectionStatus {
        match self.cache.load_all() {
            Ok(records) => {
                info!(count = records.len(), "Loaded local cache snapshot");
                self.with_view(|view| *view = records);
            }
            Err(e) => warn!(error = %e, "Failed to load local cache snapshot"),
        }

        match self.remote.connect(self.read_credential.clone()).await {
            ConnectOutcome::Connected => {
                self.remote_available.store(true, Ordering::SeqCst);
                match self.remote.search("", &SearchOptions::including_hidden()).await {
                    Ok(records) => self.with_view(|view| *view = records),
                    Err(e) => self.mark_offline(&e.to_string()),
                }
            }
            ConnectOutcome::Unreachable(reason) => {
                warn!(reason = %reason, "Remote index unreachable, using local cache");
                self.remote_available.store(false, Ordering::SeqCst);
            }
        }

        let status = self.connection_status();
        info!(
            connected = status.connected,
            cache_size = status.cache_size,
            "Catalog service initialized"
        );
        status
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let cache_size = match self.cache.len() {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "Failed to read local cache size");
                0
            }
        };
        ConnectionStatus {
            connected: self.is_remote_available(),
            has_cache: cache_size > 0,
            cache_size,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// List the catalog. Hidden records only when asked for.
    pub async fn list(&self, include_hidden: bool) -> Vec<CatalogRecord> {
        if self.is_remote_available() {
            let options = SearchOptions {
                hits_per_page: None,
                include_hidden,
            };
            match self.remote.search("", &options).await {
                Ok(records) => return records,
                Err(e) => self.mark_offline(&e.to_string()),
            }
        }
        self.view_snapshot()
            .into_iter()
            .filter(|r| include_hidden || !r.hidden)
            .collect()
    }

    /// Search visible records. An empty query lists everything visible.
    pub async fn search(&self, query: &str) -> Vec<CatalogRecord> {
        if self.is_remote_available() {
            match self.remote.search(query, &SearchOptions::default()).await {
                Ok(records) => return records,
                Err(e) => self.mark_offline(&e.to_string()),
            }
        }
        let query = query.trim().to_lowercase();
        self.view_snapshot()
            .into_iter()
            .filter(|r| !r.hidden && r.matches_query(&query))
            .collect()
    }

    /// Fetch a record by id, hidden or not.
    pub async fn get(&self, id: &str) -> Result<CatalogRecord, CatalogError> {
        if self.is_remote_available() {
            match self.remote.get_by_id(id).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) | Err(RemoteError::NotFound(_)) => {
                    return Err(CatalogError::NotFound(id.to_string()))
                }
                Err(e) => self.mark_offline(&e.to_string()),
            }
        }
        self.view_get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub async fn find_by_title(&self, title: &str) -> Result<CatalogRecord, CatalogError> {
        self.get(&derive_id(title)).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Save a draft.
    ///
    /// `editing` is the id of the record the draft was loaded from, if any.
    /// When the draft's title derives a different id, the save is a rename.
    /// A new record whose id already belongs to another title is rejected.
    pub async fn save(
        &self,
        draft: RecordDraft,
        editing: Option<&str>,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        let now = now_millis();
        let candidate = CatalogRecord::from_draft(draft.clone(), now);
        validate_record(&candidate)?;

        match editing {
            Some(old_id) if old_id != candidate.id => {
                self.rename_validated(old_id, candidate, draft, now).await
            }
            Some(_) => self.save_validated(candidate, draft, now, true).await,
            None => self.save_validated(candidate, draft, now, false).await,
        }
    }

    async fn save_validated(
        &self,
        candidate: CatalogRecord,
        draft: RecordDraft,
        now: i64,
        editing: bool,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        let _catalog = self.catalog_lock.read().await;
        let _id = self.id_locks.lock(&candidate.id).await;

        let existing = self.view_get(&candidate.id);
        if !editing {
            check_id_collision(&candidate, existing.as_ref())?;
        }
        let record = match existing {
            Some(existing) => existing.apply_draft(draft, now),
            None => candidate,
        };

        let outcome = if self.is_remote_available() {
            let mut scope = self.scope(format!("save '{}'", record.title));
            let written = match scope.write(&record).await {
                Ok(written) => written,
                Err(e) => {
                    if let CatalogError::RemoteUnavailable(reason) = &e {
                        self.mark_offline(reason);
                    }
                    return Err(e);
                }
            };
            let warnings = self.mirror_upsert(&written).into_iter().collect();
            info!(id = %written.id, "Saved record");
            SyncOutcome::remote(written).with_warnings(warnings)
        } else {
            self.cache.upsert(&record)?;
            self.with_view(|view| upsert_in(view, record.clone()));
            info!(id = %record.id, "Saved record to local cache only");
            SyncOutcome::cache_only(record)
        };

        self.emit(ChangeReason::Saved);
        Ok(outcome)
    }

    /// Rename a record: delete the old id, then create the new one, sharing
    /// a single elevated session.
    ///
    /// If the create fails after the delete went through, the old record is
    /// put back into the local cache and `RenameAborted` is returned.
    pub async fn rename(
        &self,
        old_id: &str,
        draft: RecordDraft,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        self.save(draft, Some(old_id)).await
    }

    async fn rename_validated(
        &self,
        old_id: &str,
        candidate: CatalogRecord,
        draft: RecordDraft,
        now: i64,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        let new_id = candidate.id.clone();
        let _catalog = self.catalog_lock.read().await;
        let _ids = self.id_locks.lock_many(&[old_id, new_id.as_str()]).await;

        let previous = match self.view_get(old_id) {
            Some(previous) => previous,
            None => self.get(old_id).await?,
        };
        check_id_collision(&candidate, self.view_get(&new_id).as_ref())?;
        let renamed = previous.apply_draft(draft, now);

        let outcome = if self.is_remote_available() {
            self.rename_remote(&previous, renamed).await?
        } else {
            self.rename_cache_only(&previous, renamed)?
        };

        info!(old_id, new_id = %new_id, "Renamed record");
        self.emit(ChangeReason::Renamed);
        Ok(outcome)
    }

    async fn rename_remote(
        &self,
        previous: &CatalogRecord,
        renamed: CatalogRecord,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        let mut scope = self.scope(format!(
            "rename '{}' to '{}'",
            previous.title, renamed.title
        ));
        let mut warnings = Vec::new();

        match scope.delete(&previous.id).await {
            Ok(()) => {}
            // Already gone remotely, the create still has to happen.
            Err(RemoteScopeError::Remote(RemoteError::NotFound(_))) => {}
            Err(e) => {
                let e = CatalogError::from(e);
                if let CatalogError::RemoteUnavailable(reason) = &e {
                    self.mark_offline(reason);
                }
                return Err(e);
            }
        }
        warnings.extend(self.mirror_remove(&previous.id));

        match scope.write(&renamed).await {
            Ok(written) => {
                warnings.extend(self.mirror_upsert(&written));
                Ok(SyncOutcome::remote(written).with_warnings(warnings))
            }
            Err(e) => {
                warn!(
                    old_id = %previous.id,
                    new_id = %renamed.id,
                    error = %e,
                    "Rename failed after delete, restoring previous record locally"
                );
                if let CatalogError::RemoteUnavailable(reason) = &e {
                    self.mark_offline(reason);
                }
                self.restore(previous);
                Err(CatalogError::RenameAborted {
                    old_id: previous.id.clone(),
                    new_id: renamed.id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn rename_cache_only(
        &self,
        previous: &CatalogRecord,
        renamed: CatalogRecord,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        self.cache.remove(&previous.id)?;
        self.with_view(|view| view.retain(|r| r.id != previous.id));
        if let Err(e) = self.cache.upsert(&renamed) {
            self.restore(previous);
            return Err(CatalogError::RenameAborted {
                old_id: previous.id.clone(),
                new_id: renamed.id.clone(),
                reason: CatalogError::from(e).to_string(),
            });
        }
        self.with_view(|view| upsert_in(view, renamed.clone()));
        Ok(SyncOutcome::cache_only(renamed))
    }

    fn restore(&self, previous: &CatalogRecord) {
        self.with_view(|view| upsert_in(view, previous.clone()));
        if let Err(e) = self.cache.upsert(previous) {
            warn!(id = %previous.id, error = %e, "Failed to restore record into local cache");
        }
    }

    /// Delete a record.
    ///
    /// When the remote delete fails for a reason other than access, the
    /// record is removed from the cache only and the remote error comes
    /// back as a warning.
    pub async fn delete(&self, id: &str) -> Result<SyncOutcome<()>, CatalogError> {
        let _catalog = self.catalog_lock.read().await;
        let _id = self.id_locks.lock(id).await;

        let known_locally = self.view_get(id).is_some();

        let outcome = if self.is_remote_available() {
            let mut scope = self.scope(format!("delete '{}'", id));
            match scope.delete(id).await {
                Ok(()) => {
                    let warnings = self.mirror_remove(id).into_iter().collect();
                    info!(id, "Deleted record");
                    SyncOutcome::remote(()).with_warnings(warnings)
                }
                Err(RemoteScopeError::Remote(
                    e @ (RemoteError::Unavailable(_) | RemoteError::NotFound(_)),
                )) => {
                    if let RemoteError::Unavailable(reason) = &e {
                        self.mark_offline(reason);
                    }
                    if !known_locally {
                        return Err(e.into());
                    }
                    warn!(id, error = %e, "Remote delete failed, removing from local cache only");
                    self.cache.remove(id)?;
                    self.with_view(|view| view.retain(|r| r.id != id));
                    SyncOutcome::cache_only(()).with_warnings(vec![e.into()])
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            if !known_locally {
                return Err(CatalogError::NotFound(id.to_string()));
            }
            self.cache.remove(id)?;
            self.with_view(|view| view.retain(|r| r.id != id));
            info!(id, "Deleted record from local cache only");
            SyncOutcome::cache_only(())
        };

        self.emit(ChangeReason::Deleted);
        Ok(outcome)
    }

    /// Hide or unhide a record without touching anything else.
    pub async fn set_hidden(
        &self,
        id: &str,
        hidden: bool,
    ) -> Result<SyncOutcome<CatalogRecord>, CatalogError> {
        let record = self.get(id).await?;
        // A save under a title-derived id different from `id` would rename.
        let expected = derive_id(&record.title);
        if record.id != expected {
            return Err(ValidationError::IdMismatch {
                id: record.id,
                expected,
            }
            .into());
        }
        let draft = RecordDraft::from(&record).hidden(hidden);
        self.save(draft, Some(id)).await
    }

    /// Write many records at once and rebuild the local snapshot.
    pub async fn batch_save(
        &self,
        mut records: Vec<CatalogRecord>,
    ) -> Result<SyncOutcome<Vec<CatalogRecord>>, CatalogError> {
        let now = now_millis();
        for record in &mut records {
            record.touch(now);
        }
        validate_batch(&records)?;

        let _catalog = self.catalog_lock.write().await;
        for record in &records {
            check_id_collision(record, self.view_get(&record.id).as_ref())?;
        }

        let outcome = if self.is_remote_available() {
            let mut scope = self.scope(format!("batch save of {} records", records.len()));
            let written = match scope.batch_write(&records).await {
                Ok(written) => written,
                Err(e) => {
                    if let CatalogError::RemoteUnavailable(reason) = &e {
                        self.mark_offline(reason);
                    }
                    return Err(e);
                }
            };
            drop(scope);

            let mut warnings = Vec::new();
            let snapshot = match self.remote.search("", &SearchOptions::including_hidden()).await {
                Ok(mut listed) => {
                    // The index may not have caught up with the batch yet.
                    for record in &written {
                        upsert_in(&mut listed, record.clone());
                    }
                    listed
                }
                Err(e) => {
                    warn!(error = %e, "Refresh after batch failed, merging into current view");
                    warnings.push(e.into());
                    let mut merged = self.view_snapshot();
                    for record in &written {
                        upsert_in(&mut merged, record.clone());
                    }
                    merged
                }
            };
            if let Err(e) = self.cache.replace_all(&snapshot) {
                warn!(error = %e, "Failed to write batch into local cache");
                warnings.push(e.into());
            }
            self.with_view(|view| *view = snapshot);
            info!(count = written.len(), "Batch saved to remote index");
            SyncOutcome::remote(written).with_warnings(warnings)
        } else {
            let mut merged = self.view_snapshot();
            for record in &records {
                upsert_in(&mut merged, record.clone());
            }
            self.cache.replace_all(&merged)?;
            self.with_view(|view| *view = merged);
            info!(count = records.len(), "Batch saved to local cache only");
            SyncOutcome::cache_only(records)
        };

        self.emit(ChangeReason::BatchSaved);
        Ok(outcome)
    }

    /// Re-pull the whole remote index and replace the local snapshot with
    /// it. Reconnects first when the remote was marked unavailable.
    pub async fn refresh(&self) -> Result<SyncOutcome<Vec<CatalogRecord>>, CatalogError> {
        let _catalog = self.catalog_lock.write().await;

        if !self.is_remote_available() {
            match self.remote.connect(self.read_credential.clone()).await {
                ConnectOutcome::Connected => {
                    info!("Reconnected to remote index");
                    self.remote_available.store(true, Ordering::SeqCst);
                }
                ConnectOutcome::Unreachable(reason) => {
                    return Err(CatalogError::RemoteUnavailable(reason));
                }
            }
        }

        let records = match self.remote.search("", &SearchOptions::including_hidden()).await {
            Ok(records) => records,
            Err(e) => {
                self.mark_offline(&e.to_string());
                return Err(e.into());
            }
        };

        let mut warnings = Vec::new();
        if let Err(e) = self.cache.replace_all(&records) {
            warn!(error = %e, "Failed to replace local cache snapshot");
            warnings.push(e.into());
        }
        self.with_view(|view| *view = records.clone());
        info!(count = records.len(), "Refreshed catalog from remote index");

        self.emit(ChangeReason::Refreshed);
        Ok(SyncOutcome::remote(records).with_warnings(warnings))
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Serialize the whole catalog, hidden records included.
    pub async fn export_catalog(&self) -> Result<String, CatalogError> {
        let records = self.list(true).await;
        Ok(export_records(&records)?)
    }

    /// Parse catalog text and store it through [`batch_save`](Self::batch_save).
    pub async fn import_catalog(
        &self,
        text: &str,
    ) -> Result<SyncOutcome<Vec<CatalogRecord>>, CatalogError> {
        let records = parse_catalog_text(text, now_millis())?;
        info!(count = records.len(), "Importing catalog");
        self.batch_save(records).await
    }
}
