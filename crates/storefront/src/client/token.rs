//! Session token store.
//!
//! Holds the backend's context token in memory and in durable storage.
//! Reads prefer memory and fall back to storage; every token the backend
//! hands out overwrites both. There is deliberately no way to clear the
//! token: after logout the backend rotates it under the same slot.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use furniture_core::ContextToken;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, KeyValueStoreExt};

/// Storage slot of the context token.
pub const TOKEN_STORAGE_KEY: &str = "sw-context-token";

/// Durable token record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredToken {
    token: ContextToken,
    expires_at: DateTime<Utc>,
}

/// Memory-plus-storage holder for the context token.
pub struct SessionTokenStore {
    memory: RwLock<Option<ContextToken>>,
    storage: Arc<dyn KeyValueStore>,
    max_age: TimeDelta,
}

impl std::fmt::Debug for SessionTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let memory = self.memory.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionTokenStore")
            .field("memory", &*memory)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl SessionTokenStore {
    /// Create a store backed by `storage`; records older than `max_age` are
    /// ignored on read.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, max_age: TimeDelta) -> Self {
        Self {
            memory: RwLock::new(None),
            storage,
            max_age,
        }
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<ContextToken> {
        if let Some(token) = self
            .memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(token);
        }

        let stored = match self.storage.get_json::<StoredToken>(TOKEN_STORAGE_KEY) {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored context token");
                return None;
            }
        };

        if stored.expires_at <= Utc::now() {
            debug!("Stored context token expired");
            return None;
        }

        let mut memory = self.memory.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have set a fresh token in the meantime.
        Some(memory.get_or_insert(stored.token).clone())
    }

    /// Replace the token in memory and storage.
    ///
    /// A storage failure is logged; the in-memory value still changes so
    /// the running session keeps working.
    pub fn set(&self, token: ContextToken) {
        debug!(token = %token.preview(), "Context token saved");

        let record = StoredToken {
            token: token.clone(),
            expires_at: Utc::now() + self.max_age,
        };
        *self.memory.write().unwrap_or_else(PoisonError::into_inner) = Some(token);

        if let Err(e) = self.storage.set_json(TOKEN_STORAGE_KEY, &record) {
            warn!(error = %e, "Failed to persist context token");
        }
    }
}
