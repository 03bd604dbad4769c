//! Per-user key management over injected local storage.
//!
//! The key store is the single source of truth for a device's content key.
//! Keys are created lazily on first need; creation is announced on a broadcast
//! channel so the sync service can back the key up without polling.

use tokio::sync::broadcast;

use crate::engine::{self, ContentKey};
use crate::error::CryptoError;
use crate::store::KeyValueStore;
use veilchat_shared::ids::UserId;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Signals emitted by the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A key was generated for this user on this device.
    Created(UserId),
}

/// Local store for per-user content keys.
pub struct KeyStore {
    store: Box<dyn KeyValueStore>,
    events: broadcast::Sender<KeyEvent>,
}

impl KeyStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { store, events }
    }

    fn storage_key(user_id: &UserId) -> String {
        format!("encryption_key/{user_id}")
    }

    /// Return the user's key, generating and persisting one if absent.
    ///
    /// Emits [`KeyEvent::Created`] exactly once per generated key.
    pub fn get_or_create_key(&self, user_id: &UserId) -> Result<ContentKey, CryptoError> {
        let storage_key = Self::storage_key(user_id);

        if let Some(exported) = self.store.get(&storage_key)? {
            return engine::import_key(&exported);
        }

        let key = engine::generate_key();
        self.store.set(&storage_key, &engine::export_key(&key))?;

        // No receivers is fine; the periodic sync check covers that case.
        let _ = self.events.send(KeyEvent::Created(*user_id));

        Ok(key)
    }

    /// Whether a key exists for this user. Never imports the key material.
    pub fn has_key(&self, user_id: &UserId) -> Result<bool, CryptoError> {
        Ok(self.store.get(&Self::storage_key(user_id))?.is_some())
    }

    /// Remove the user's key. Irreversible on this device without a restore.
    pub fn clear_key(&self, user_id: &UserId) -> Result<(), CryptoError> {
        self.store.delete(&Self::storage_key(user_id))
    }

    /// Persist a key recovered from a backup.
    ///
    /// Restores do not emit [`KeyEvent::Created`]: a restored key already has
    /// a cloud backup, so there is nothing for the sync service to do.
    pub fn install_key(&self, user_id: &UserId, key: &ContentKey) -> Result<(), CryptoError> {
        self.store
            .set(&Self::storage_key(user_id), &engine::export_key(key))
    }

    /// Subscribe to key lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        self.events.subscribe()
    }
}
