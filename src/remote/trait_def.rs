//! RemoteIndex trait definition.

use super::credentials::{ElevatedSession, ReadCredential, WriteCredential};
use crate::catalog::CatalogRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Page-size ceiling of the hosted index.
pub const MAX_HITS_PER_PAGE: usize = 1000;

/// Page size of a non-empty query when none is requested.
pub const DEFAULT_HITS_PER_PAGE: usize = 100;

/// Errors returned by a remote index.
///
/// `PermissionDenied` means "ask for elevated access", `Unavailable` means
/// "fall back to the cache".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Remote index unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied by remote index: {0}")]
    PermissionDenied(String),

    #[error("Record '{0}' not found in remote index")]
    NotFound(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result of probing the remote index with the read credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Unreachable(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Requested page size, clamped to [`MAX_HITS_PER_PAGE`].
    pub hits_per_page: Option<usize>,
    /// Also return hidden records.
    pub include_hidden: bool,
}

impl SearchOptions {
    pub fn including_hidden() -> Self {
        Self {
            hits_per_page: None,
            include_hidden: true,
        }
    }

    /// Page size actually requested for `query`.
    ///
    /// An empty query lists the whole index up to the ceiling.
    pub fn effective_hits_per_page(&self, query: &str) -> usize {
        match self.hits_per_page {
            Some(hits) => hits.clamp(1, MAX_HITS_PER_PAGE),
            None if query.trim().is_empty() => MAX_HITS_PER_PAGE,
            None => DEFAULT_HITS_PER_PAGE,
        }
    }
}

/// Typed access to a hosted search index under one of two credential
/// scopes.
///
/// Reads use the read credential given to `connect`. Writes take an
/// optional elevated session: without one the read credential is used,
/// which a write-protected index rejects with `PermissionDenied`.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Store the read credential and probe the index. Never fails.
    async fn connect(&self, credential: ReadCredential) -> ConnectOutcome;

    async fn search(&self, query: &str, options: &SearchOptions)
        -> RemoteResult<Vec<CatalogRecord>>;

    async fn get_by_id(&self, id: &str) -> RemoteResult<Option<CatalogRecord>>;

    /// Bind a write credential to a session. Nothing is persisted.
    async fn elevate(&self, credential: WriteCredential) -> RemoteResult<ElevatedSession>;

    async fn write(
        &self,
        record: &CatalogRecord,
        session: Option<&ElevatedSession>,
    ) -> RemoteResult<CatalogRecord>;

    async fn delete(&self, id: &str, session: Option<&ElevatedSession>) -> RemoteResult<()>;

    /// Write many records at once. Requires elevation.
    async fn batch_write(
        &self,
        records: &[CatalogRecord],
        session: &ElevatedSession,
    ) -> RemoteResult<Vec<CatalogRecord>>;

    /// Discard a session. Must be called after every elevated operation.
    fn release(&self, session: ElevatedSession);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_hits_per_page() {
        let defaults = SearchOptions::default();
        assert_eq!(defaults.effective_hits_per_page(""), MAX_HITS_PER_PAGE);
        assert_eq!(defaults.effective_hits_per_page("  "), MAX_HITS_PER_PAGE);
        assert_eq!(defaults.effective_hits_per_page("jig"), DEFAULT_HITS_PER_PAGE);

        let huge = SearchOptions {
            hits_per_page: Some(50_000),
            include_hidden: false,
        };
        assert_eq!(huge.effective_hits_per_page("jig"), MAX_HITS_PER_PAGE);

        let zero = SearchOptions {
            hits_per_page: Some(0),
            include_hidden: false,
        };
        assert_eq!(zero.effective_hits_per_page(""), 1);
    }
}
