//! Persistence bridge over the durable key-value store.
//!
//! Reads never fail: a missing key, a corrupt blob, or a missing store all
//! produce the caller's default plus a warning. Writes are best-effort and
//! swallow their errors after logging them.
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::schema::Database;
use super::types::{BridgeError, StorageKey};
use crate::model::FavoriteItem;
use crate::store::{favorites, Preferences};

/// Reads and writes the `userPreferences` and `favorites` blobs.
///
/// `store` is `None` when no durable store could be opened; the bridge then
/// behaves like an empty store that discards writes.
#[derive(Clone)]
pub struct PersistentBridge {
    store: Option<Database>,
}

impl PersistentBridge {
    pub fn new(db: Database) -> Self {
        Self { store: Some(db) }
    }

    /// A bridge with no durable store behind it.
    pub fn detached() -> Self {
        Self { store: None }
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_some()
    }

    /// Load the raw JSON stored under `key`.
    ///
    /// Returns `None` (after logging a warning) for a missing key, unparsable
    /// JSON, a storage failure, or a detached bridge.
    pub async fn load_json(&self, key: StorageKey) -> Option<Value> {
        let Some(db) = &self.store else {
            tracing::warn!(key = %key, "No durable store available, using defaults");
            return None;
        };

        let raw = match db.get_value(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::warn!(key = %key, "Nothing persisted yet, using defaults");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read persisted state, using defaults");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt persisted state, using defaults");
                None
            }
        }
    }

    /// Load and deserialize `key` strictly, falling back to `default`.
    pub async fn load<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> T {
        let Some(value) = self.load_json(key).await else {
            return default;
        };
        match serde_json::from_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Persisted state has unexpected shape, using defaults");
                default
            }
        }
    }

    /// Load preferences, tolerating partial or legacy blobs field by field.
    pub async fn load_preferences(&self) -> Preferences {
        match self.load_json(StorageKey::UserPreferences).await {
            Some(value) => Preferences::from_stored(value),
            None => Preferences::default(),
        }
    }

    /// Load favorites, skipping entries that cannot be recovered.
    pub async fn load_favorites(&self) -> Vec<FavoriteItem> {
        match self.load_json(StorageKey::Favorites).await {
            Some(value) => favorites::from_stored(value),
            None => Vec::new(),
        }
    }

    /// Serialize `value` under `key`. Errors are logged, never returned.
    pub async fn save<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) {
        match self.try_save(key, value).await {
            Ok(()) => tracing::debug!(key = %key, "Persisted state"),
            Err(BridgeError::Unavailable) => {
                tracing::debug!(key = %key, "No durable store, skipping write");
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to persist state"),
        }
    }

    async fn try_save<T: Serialize + ?Sized>(
        &self,
        key: StorageKey,
        value: &T,
    ) -> Result<(), BridgeError> {
        let db = self.store.as_ref().ok_or(BridgeError::Unavailable)?;
        let json = serde_json::to_string(value)?;
        db.set_value(key.as_str(), &json).await?;
        Ok(())
    }
}
