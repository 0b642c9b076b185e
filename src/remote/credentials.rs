//! Credentials for the two access tiers of the remote index.
//!
//! Key material is zeroized when dropped and never printed.

use std::fmt;
use std::time::Instant;
use uuid::Uuid;
use zeroize::Zeroize;

// =============================================================================
// Read Credential
// =============================================================================

/// Search-only API key. Enough for every read.
#[derive(Clone, PartialEq, Eq)]
pub struct ReadCredential {
    key: String,
}

impl ReadCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    pub fn expose(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ReadCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadCredential(***)")
    }
}

impl Drop for ReadCredential {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

// =============================================================================
// Write Credential
// =============================================================================

/// Write-capable (admin) API key, obtained on demand from a collaborator.
pub struct WriteCredential {
    key: String,
}

impl WriteCredential {
    /// Returns `None` for a blank key, which counts as a decline.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let mut key = key.into();
        let trimmed = key.trim().to_string();
        key.zeroize();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self { key: trimmed })
        }
    }

    pub fn expose(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for WriteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteCredential(***)")
    }
}

impl Drop for WriteCredential {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

// =============================================================================
// Elevated Session
// =============================================================================

/// A write credential bound to one logical write operation.
///
/// Sessions are handed back to [`RemoteIndex::release`](super::RemoteIndex::release)
/// once the operation ends. The credential is zeroized with the session.
pub struct ElevatedSession {
    id: Uuid,
    credential: WriteCredential,
    created_at: Instant,
}

impl ElevatedSession {
    pub fn new(credential: WriteCredential) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn credential(&self) -> &WriteCredential {
        &self.credential
    }
}

impl fmt::Debug for ElevatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevatedSession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
