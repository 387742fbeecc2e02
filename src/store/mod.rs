//! Credential storage
//!
//! Two independent key-value slots back the credential pair: a
//! session-scoped slot for the short-lived access token and a durable slot
//! for the longer-lived refresh token. No component reads the backing
//! medium directly; everything goes through the [`TokenStore`] adapter.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AuthError;
use crate::jwt;

/// Storage key for the access credential slot.
pub const ACCESS_KEY: &str = "access_credential";
/// Storage key for the refresh credential slot.
pub const REFRESH_KEY: &str = "refresh_credential";

/// Stored credential: a token plus its owner and expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub token: String,
    /// Epoch seconds; [`jwt::NO_EXPIRATION`] when the token asserts none.
    #[serde(default = "no_expiration")]
    pub exp: i64,
}

fn no_expiration() -> i64 {
    jwt::NO_EXPIRATION
}

impl CredentialRecord {
    pub fn new(username: impl Into<String>, token: impl Into<String>, exp: i64) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            exp,
        }
    }

    pub fn is_expired(&self, offset_seconds: i64) -> bool {
        jwt::is_expired(self.exp, offset_seconds)
    }
}

/// Key-value storage backend for one slot scope.
///
/// Implementations use interior mutability; a single logical writer at a
/// time is assumed (the event loop serializes access).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// Adapter mapping the credential pair onto two storage slots.
#[derive(Clone)]
pub struct TokenStore {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Access records go to `session` (ephemeral), refresh records to
    /// `durable` (persistent).
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    /// Both slots in volatile memory. Useful for tests and for hosts with
    /// no persistent storage.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn read_access(&self) -> Option<CredentialRecord> {
        read_slot(&*self.session, ACCESS_KEY)
    }

    pub fn write_access(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        write_slot(&*self.session, ACCESS_KEY, record)
    }

    pub fn read_refresh(&self) -> Option<CredentialRecord> {
        read_slot(&*self.durable, REFRESH_KEY)
    }

    pub fn write_refresh(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        write_slot(&*self.durable, REFRESH_KEY, record)
    }

    /// Clear both slots. Idempotent.
    pub fn clear_all(&self) -> Result<(), AuthError> {
        self.session.remove(ACCESS_KEY)?;
        self.durable.remove(REFRESH_KEY)?;
        Ok(())
    }
}

/// A slot that is absent, holds malformed JSON, or is missing its token
/// reads as "not logged in" rather than failing.
fn read_slot(store: &dyn KeyValueStore, key: &str) -> Option<CredentialRecord> {
    let raw = store.get(key)?;
    match serde_json::from_str::<CredentialRecord>(&raw) {
        Ok(record) if !record.token.is_empty() => Some(record),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Discarding malformed credential record under {}: {}", key, e);
            None
        }
    }
}

fn write_slot(
    store: &dyn KeyValueStore,
    key: &str,
    record: &CredentialRecord,
) -> Result<(), AuthError> {
    let json = serde_json::to_string(record)
        .map_err(|e| AuthError::Storage(format!("failed to serialize credential record: {}", e)))?;
    store.set(key, &json)
}
