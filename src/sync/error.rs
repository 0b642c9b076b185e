use crate::cache::CacheError;
use crate::catalog::ValidationError;
use crate::remote::RemoteError;
use thiserror::Error;

/// Coarse classification of a [`CatalogError`] for collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Try again later.
    Connectivity,
    /// Different access is needed.
    Access,
    /// The input was invalid.
    Input,
    /// Stored, but not durably everywhere.
    Durability,
    /// Nothing with that id exists.
    Missing,
}

/// Errors surfaced by the catalog sync service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Remote index unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Elevated access was declined for {operation}")]
    ElevationDeclined { operation: String },

    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Rename of '{old_id}' to '{new_id}' aborted, '{old_id}' was restored locally: {reason}")]
    RenameAborted {
        old_id: String,
        new_id: String,
        reason: String,
    },

    #[error("Cache write failed: {0}")]
    CacheWriteFailed(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::RemoteUnavailable(_) => ErrorKind::Connectivity,
            CatalogError::RenameAborted { .. } => ErrorKind::Connectivity,
            CatalogError::PermissionDenied(_) => ErrorKind::Access,
            CatalogError::ElevationDeclined { .. } => ErrorKind::Access,
            CatalogError::ValidationFailed(_) => ErrorKind::Input,
            CatalogError::CacheWriteFailed(_) => ErrorKind::Durability,
            CatalogError::NotFound(_) => ErrorKind::Missing,
        }
    }
}

impl From<RemoteError> for CatalogError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Unavailable(reason) => CatalogError::RemoteUnavailable(reason),
            RemoteError::PermissionDenied(reason) => CatalogError::PermissionDenied(reason),
            RemoteError::NotFound(id) => CatalogError::NotFound(id),
        }
    }
}

impl From<CacheError> for CatalogError {
    fn from(e: CacheError) -> Self {
        CatalogError::CacheWriteFailed(e.to_string())
    }
}
