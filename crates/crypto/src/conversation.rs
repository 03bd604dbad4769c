//! Conversation encryption at the persistence boundary.
//!
//! The adapter is the sole translator between plaintext application messages
//! and the remote conversation store's wire representation. Lists may mix
//! encrypted and plaintext messages (conversations written before encryption
//! was introduced), and a single undecryptable message must not take down the
//! whole conversation load.

use crate::engine;
use crate::error::CryptoError;
use crate::keystore::KeyStore;
use veilchat_shared::api::conversation::Message;
use veilchat_shared::ids::UserId;

/// Placeholder shown for a message whose ciphertext cannot be decrypted.
pub const DECRYPT_FAILED_SENTINEL: &str = "[message could not be decrypted]";

/// Encrypt every message's content before it leaves the device.
///
/// Obtains (creating if needed) the user's key, encrypts each `content`, and
/// marks the result `encrypted = true`. Produces a new list; the input is not
/// mutated. An empty list performs no key work at all.
pub fn encrypt_conversation(
    messages: &[Message],
    keystore: &KeyStore,
    user_id: &UserId,
) -> Result<Vec<Message>, CryptoError> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let key = keystore.get_or_create_key(user_id)?;

    let mut encrypted = Vec::with_capacity(messages.len());
    for message in messages {
        encrypted.push(Message {
            content: engine::encrypt(&message.content, &key)?,
            encrypted: true,
            ..message.clone()
        });
    }

    Ok(encrypted)
}

/// Decrypt a conversation loaded from the remote store.
///
/// Messages with `encrypted = false` pass through unchanged. A per-message
/// decrypt failure substitutes [`DECRYPT_FAILED_SENTINEL`] for that message
/// only; the rest of the conversation still loads. The key is only touched
/// when the list actually contains encrypted messages.
pub fn decrypt_conversation(
    messages: &[Message],
    keystore: &KeyStore,
    user_id: &UserId,
) -> Result<Vec<Message>, CryptoError> {
    let key = if messages.iter().any(|m| m.encrypted) {
        Some(keystore.get_or_create_key(user_id)?)
    } else {
        None
    };

    let mut decrypted = Vec::with_capacity(messages.len());
    for message in messages {
        match (&key, message.encrypted) {
            (Some(key), true) => {
                let item = match engine::decrypt(&message.content, key) {
                    Ok(content) => Message {
                        content,
                        encrypted: false,
                        ..message.clone()
                    },
                    Err(e) => {
                        tracing::warn!("failed to decrypt message: {e}");
                        Message {
                            content: DECRYPT_FAILED_SENTINEL.to_string(),
                            encrypted: false,
                            ..message.clone()
                        }
                    }
                };
                decrypted.push(item);
            }
            _ => decrypted.push(message.clone()),
        }
    }

    Ok(decrypted)
}
