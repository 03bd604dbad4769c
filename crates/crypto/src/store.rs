//! Local key-value persistence behind the key store.
//!
//! The key store consumes a minimal injected interface so the host can supply
//! whatever storage the platform offers. Two implementations are provided:
//! SQLite (the durable on-device default) and an in-memory map for tests and
//! ephemeral sessions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::CryptoError;

/// Minimal string key-value storage consumed by [`crate::keystore::KeyStore`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CryptoError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CryptoError>;
    fn delete(&self, key: &str) -> Result<(), CryptoError>;
}

/// Durable key-value store backed by a SQLite database.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory store; contents are lost when dropped.
    pub fn open_in_memory() -> Result<Self, CryptoError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, CryptoError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CryptoError> {
        self.conn
            .lock()
            .map_err(|e| CryptoError::StorageError(format!("store lock poisoned: {e}")))
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CryptoError> {
        let conn = self.lock()?;
        match conn.query_row(
            "SELECT value FROM local_store WHERE key = ?1",
            [key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CryptoError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO local_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CryptoError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM local_store WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// In-memory key-value store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CryptoError> {
        self.entries
            .lock()
            .map_err(|e| CryptoError::StorageError(format!("store lock poisoned: {e}")))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CryptoError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CryptoError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CryptoError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
