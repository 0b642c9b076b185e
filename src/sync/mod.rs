//! Catalog synchronization.
//!
//! [`CatalogSyncService`] reconciles the remote index with the local cache
//! and owns the elevation protocol for writes.

mod elevation;
mod error;
mod events;
mod locks;
mod service;

pub use elevation::{
    ChannelCredentialProvider, CredentialProvider, CredentialRequest, StaticCredentialProvider,
};
pub use error::{CatalogError, ErrorKind};
pub use events::{Backend, CatalogEvent, ChangeReason, ConnectionStatus, SyncOutcome};
pub use service::CatalogSyncService;
