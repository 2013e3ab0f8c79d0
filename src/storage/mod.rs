//! Durable storage: a SQLite key-value table and the persistence bridge
//! that reads and writes the preferences and favorites blobs through it.

mod bridge;
mod kv;
mod schema;
mod types;

pub use bridge::PersistentBridge;
pub use schema::Database;
pub use types::{BridgeError, DatabaseError, StorageKey};
