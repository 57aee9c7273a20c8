//! `milvault-store`: persistent key-value session storage.
//!
//! Models the browser-storage contract the rest of the client is written
//! against: string keys, JSON values, and **loss-tolerant** reads/writes. A
//! backend failure or an unparseable value is logged and surfaced as
//! `None`/no-op, never as an error the caller must handle. Anything that
//! must not be silently lost does not belong in this store.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod backend;
pub mod file;

pub use backend::{MemoryBackend, StoreBackend};
pub use file::FileBackend;

/// Well-known keys for the session slice of the store.
pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const CURRENT_USER: &str = "current_user";
    pub const REMEMBER_EMAIL: &str = "remember_email";
}

/// Typed facade over a [`StoreBackend`].
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StoreBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// In-memory store (tests, ephemeral sessions).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Read and JSON-decode a value. Missing keys, backend failures and
    /// decode failures all read as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_string(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(%key, "failed to decode stored value: {err}");
                None
            }
        }
    }

    /// JSON-encode and write a value. Failures are logged and dropped.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_string(key, &raw),
            Err(err) => {
                tracing::error!(%key, "failed to encode value for store: {err}");
            }
        }
    }

    /// Read a raw string value (tokens are stored unwrapped, not as JSON).
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(%key, "store read failed: {err:?}");
                None
            }
        }
    }

    pub fn set_string(&self, key: &str, value: &str) {
        if let Err(err) = self.backend.write(key, value) {
            tracing::error!(%key, "store write failed: {err:?}");
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(err) = self.backend.delete(key) {
            tracing::error!(%key, "store delete failed: {err:?}");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.clear() {
            tracing::error!("store clear failed: {err:?}");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_string(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys,
            Err(err) => {
                tracing::error!("store key listing failed: {err:?}");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
