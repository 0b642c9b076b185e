//! Remote index access.
//!
//! [`RemoteIndex`] is the seam between the sync service and the hosted
//! index. [`AlgoliaIndexClient`] talks to the real service over HTTP,
//! [`InMemoryIndex`] keeps everything in process.

mod algolia;
mod credentials;
mod memory;
mod trait_def;

pub use algolia::{AlgoliaConfig, AlgoliaIndexClient};
pub use credentials::{ElevatedSession, ReadCredential, WriteCredential};
pub use memory::InMemoryIndex;
pub use trait_def::{
    ConnectOutcome, RemoteError, RemoteIndex, RemoteResult, SearchOptions, DEFAULT_HITS_PER_PAGE,
    MAX_HITS_PER_PAGE,
};
