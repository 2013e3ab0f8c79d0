use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors opening or migrating the durable store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

/// Failures inside the persistence bridge.
///
/// These never leave the bridge: `load` falls back to defaults and `save`
/// logs and returns.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No durable store available")]
    Unavailable,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Keys
// ============================================================================

/// The two logical blobs the bridge persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    /// Shape: `Preferences`.
    UserPreferences,
    /// Shape: sequence of `FavoriteItem`.
    Favorites,
}

impl StorageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserPreferences => "userPreferences",
            StorageKey::Favorites => "favorites",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
