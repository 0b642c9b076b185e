use crate::catalog::CatalogRecord;

/// What caused a catalog change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Saved,
    Renamed,
    Deleted,
    BatchSaved,
    Refreshed,
}

/// Notification sent to subscribers so they can resynchronize without
/// polling.
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    /// `records` is the full current view, hidden records included.
    CatalogChanged {
        records: Vec<CatalogRecord>,
        reason: ChangeReason,
    },
}

/// Which store a write ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    CacheOnly,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Remote => "remote",
            Backend::CacheOnly => "cache only",
        }
    }
}

/// Result of a successful write.
///
/// `warnings` carries non-fatal problems such as a failed cache mirror, or
/// the remote error behind a degraded delete.
#[derive(Debug, Clone)]
pub struct SyncOutcome<T> {
    pub value: T,
    pub applied_to: Backend,
    pub warnings: Vec<super::CatalogError>,
}

impl<T> SyncOutcome<T> {
    pub fn remote(value: T) -> Self {
        Self {
            value,
            applied_to: Backend::Remote,
            warnings: Vec::new(),
        }
    }

    pub fn cache_only(value: T) -> Self {
        Self {
            value,
            applied_to: Backend::CacheOnly,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<super::CatalogError>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Where reads are currently served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub has_cache: bool,
    pub cache_size: usize,
}
