//! Elevated write access.
//!
//! The service never obtains credentials itself. It asks a
//! [`CredentialProvider`] supplied by the collaborator, binds the answer to
//! a remote session for exactly one logical operation and releases it when
//! that operation ends.

use super::error::CatalogError;
use crate::catalog::CatalogRecord;
use crate::remote::{ElevatedSession, RemoteError, RemoteIndex, WriteCredential};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

/// Source of write credentials, owned by the collaborator.
///
/// Returning `None` declines the request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn request_elevated_credential(&self, operation: &str) -> Option<WriteCredential>;
}

// =============================================================================
// Static Provider
// =============================================================================

/// Answers every request the same way. Used for non-interactive runs with
/// an admin key from the environment, and in tests.
pub struct StaticCredentialProvider {
    key: Option<String>,
    requests: AtomicUsize,
}

impl StaticCredentialProvider {
    pub fn granting(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            key: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of requests answered so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for StaticCredentialProvider {
    fn drop(&mut self) {
        if let Some(key) = self.key.as_mut() {
            key.zeroize();
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn request_elevated_credential(&self, operation: &str) -> Option<WriteCredential> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!(operation, "Static credential request");
        self.key.as_ref().and_then(|key| WriteCredential::new(key.as_str()))
    }
}

// =============================================================================
// Channel Provider
// =============================================================================

/// A pending credential request forwarded to whoever owns the UI.
///
/// Dropping it without answering counts as a decline.
pub struct CredentialRequest {
    pub operation: String,
    responder: oneshot::Sender<Option<WriteCredential>>,
}

impl CredentialRequest {
    /// Answer with `key`. A blank key is a decline.
    pub fn grant(self, key: impl Into<String>) {
        self.respond(WriteCredential::new(key));
    }

    pub fn decline(self) {
        self.respond(None);
    }

    pub fn respond(self, credential: Option<WriteCredential>) {
        if self.responder.send(credential).is_err() {
            debug!(operation = %self.operation, "Credential request was abandoned");
        }
    }
}

/// Forwards requests over an mpsc channel and awaits the answer.
#[derive(Clone)]
pub struct ChannelCredentialProvider {
    requests: mpsc::Sender<CredentialRequest>,
}

impl ChannelCredentialProvider {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<CredentialRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl CredentialProvider for ChannelCredentialProvider {
    async fn request_elevated_credential(&self, operation: &str) -> Option<WriteCredential> {
        let (responder, answer) = oneshot::channel();
        let request = CredentialRequest {
            operation: operation.to_string(),
            responder,
        };
        if self.requests.send(request).await.is_err() {
            warn!(operation, "No one is listening for credential requests");
            return None;
        }
        answer.await.unwrap_or(None)
    }
}

// =============================================================================
// Write Scope
// =============================================================================

/// Owns an elevated session and releases it on drop.
struct ElevationGuard {
    remote: Arc<dyn RemoteIndex>,
    session: Option<ElevatedSession>,
}

impl ElevationGuard {
    fn session(&self) -> Option<&ElevatedSession> {
        self.session.as_ref()
    }
}

impl Drop for ElevationGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session = %session.id(), "Releasing elevated session");
            self.remote.release(session);
        }
    }
}

/// One logical write operation against the remote.
///
/// The first attempt uses the read credential. A `PermissionDenied` while
/// unelevated asks the provider for a credential once, elevates and
/// retries. Later operations in the same scope reuse the session.
pub(crate) struct WriteScope {
    remote: Arc<dyn RemoteIndex>,
    provider: Option<Arc<dyn CredentialProvider>>,
    operation: String,
    guard: Option<ElevationGuard>,
}

impl WriteScope {
    pub(crate) fn new(
        remote: Arc<dyn RemoteIndex>,
        provider: Option<Arc<dyn CredentialProvider>>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            provider,
            operation: operation.into(),
            guard: None,
        }
    }

    fn session(&self) -> Option<&ElevatedSession> {
        self.guard.as_ref().and_then(ElevationGuard::session)
    }

    fn is_elevated(&self) -> bool {
        self.guard.is_some()
    }

    /// Obtain a credential and elevate. `denied` is surfaced when there is
    /// no provider to ask.
    async fn elevate(&mut self, denied: String) -> Result<(), CatalogError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(CatalogError::PermissionDenied(denied));
        };
        info!(operation = %self.operation, "Requesting elevated credential");
        let Some(credential) = provider.request_elevated_credential(&self.operation).await else {
            info!(operation = %self.operation, "Elevation declined");
            return Err(CatalogError::ElevationDeclined {
                operation: self.operation.clone(),
            });
        };
        let session = self.remote.elevate(credential).await?;
        self.guard = Some(ElevationGuard {
            remote: self.remote.clone(),
            session: Some(session),
        });
        Ok(())
    }

    pub(crate) async fn write(&mut self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let first = self.remote.write(record, self.session()).await;
        match first {
            Err(RemoteError::PermissionDenied(reason)) if !self.is_elevated() => {
                self.elevate(reason).await?;
                Ok(self.remote.write(record, self.session()).await?)
            }
            other => Ok(other?),
        }
    }

    pub(crate) async fn delete(&mut self, id: &str) -> Result<(), RemoteScopeError> {
        let first = self.remote.delete(id, self.session()).await;
        match first {
            Err(RemoteError::PermissionDenied(reason)) if !self.is_elevated() => {
                self.elevate(reason).await.map_err(RemoteScopeError::Elevation)?;
                self.remote
                    .delete(id, self.session())
                    .await
                    .map_err(RemoteScopeError::Remote)
            }
            other => other.map_err(RemoteScopeError::Remote),
        }
    }

    /// Batch writes always need a session, so elevation happens up front.
    pub(crate) async fn batch_write(
        &mut self,
        records: &[CatalogRecord],
    ) -> Result<Vec<CatalogRecord>, CatalogError> {
        if !self.is_elevated() {
            self.elevate("batch writes require elevated access".to_string())
                .await?;
        }
        match self.session() {
            Some(session) => Ok(self.remote.batch_write(records, session).await?),
            None => Err(CatalogError::PermissionDenied(
                "no elevated session".to_string(),
            )),
        }
    }
}

/// Failure of a scoped delete, keeping the remote error intact so the
/// caller can tell a degraded delete apart from a refused one.
#[derive(Debug)]
pub(crate) enum RemoteScopeError {
    Elevation(CatalogError),
    Remote(RemoteError),
}

impl From<RemoteScopeError> for CatalogError {
    fn from(e: RemoteScopeError) -> Self {
        match e {
            RemoteScopeError::Elevation(e) => e,
            RemoteScopeError::Remote(e) => e.into(),
        }
    }
}
