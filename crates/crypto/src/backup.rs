//! Backup and restore codecs for the content key.
//!
//! Three interchangeable encodings, all built on the engine and the KDF:
//! a password-protected backup, a self-contained recovery code, and an
//! automatic cloud backup wrapped with a derived secret instead of a
//! user-supplied password. Restores never modify local state on failure.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::{self, ContentKey};
use crate::error::CryptoError;
use crate::kdf;
use crate::keystore::KeyStore;
use veilchat_shared::ids::UserId;

const CHECKSUM_SIZE: usize = 4;

/// A wrapped key plus the salt its wrapping key was derived with.
///
/// This is the record written to the remote profile's backup fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBackup {
    /// Exported key encrypted under the derived wrapping key.
    pub encrypted_key: String,
    /// base64 of the 16-byte KDF salt.
    pub salt: String,
}

/// Wrap a key under a user-supplied password with a fresh salt.
pub fn password_backup(key: &ContentKey, password: &str) -> Result<KeyBackup, CryptoError> {
    let salt = kdf::generate_salt();
    let wrapping_key = kdf::derive_wrapping_key(password, &salt)?;
    let encrypted_key = engine::encrypt(&engine::export_key(key), &wrapping_key)?;

    Ok(KeyBackup {
        encrypted_key,
        salt: base64::engine::general_purpose::STANDARD.encode(salt),
    })
}

/// Restore a key from a password backup.
///
/// A wrong password is indistinguishable from a corrupted record; both
/// surface as `RestoreFailed`.
pub fn password_restore(backup: &KeyBackup, password: &str) -> Result<ContentKey, CryptoError> {
    let salt = base64::engine::general_purpose::STANDARD
        .decode(&backup.salt)
        .map_err(|_| CryptoError::RestoreFailed("malformed salt".into()))?;

    let wrapping_key = kdf::derive_wrapping_key(password, &salt)
        .map_err(|_| CryptoError::RestoreFailed("malformed salt".into()))?;

    let exported = engine::decrypt(&backup.encrypted_key, &wrapping_key)
        .map_err(|_| CryptoError::RestoreFailed("wrong password or corrupted backup".into()))?;

    engine::import_key(&exported)
}

/// Encode a key as a portable recovery code.
///
/// `base64(exported-key bytes || first 4 bytes of SHA-256(exported-key bytes))`
/// — self-contained, no external state needed to restore from it.
pub fn recovery_code(key: &ContentKey) -> String {
    let exported = engine::export_key(key);
    let key_bytes = exported.as_bytes();
    let digest = Sha256::digest(key_bytes);

    let mut combined = Vec::with_capacity(key_bytes.len() + CHECKSUM_SIZE);
    combined.extend_from_slice(key_bytes);
    combined.extend_from_slice(&digest[..CHECKSUM_SIZE]);

    base64::engine::general_purpose::STANDARD.encode(combined)
}

/// Restore a key from a recovery code.
///
/// The checksum is verified before any key import is attempted; a corrupted
/// or mistyped code fails with `ChecksumMismatch`.
pub fn recovery_code_restore(code: &str) -> Result<ContentKey, CryptoError> {
    let combined = base64::engine::general_purpose::STANDARD
        .decode(code.trim())
        .map_err(|_| CryptoError::ChecksumMismatch)?;

    if combined.len() <= CHECKSUM_SIZE {
        return Err(CryptoError::ChecksumMismatch);
    }

    let (key_bytes, checksum) = combined.split_at(combined.len() - CHECKSUM_SIZE);
    let digest = Sha256::digest(key_bytes);
    if checksum != &digest[..CHECKSUM_SIZE] {
        return Err(CryptoError::ChecksumMismatch);
    }

    let exported = std::str::from_utf8(key_bytes)
        .map_err(|_| CryptoError::InvalidKey("recovery code key bytes are not UTF-8".into()))?;
    engine::import_key(exported)
}

/// Wrap a key for automatic cloud backup using the derived auto secret.
///
/// Single attempt; the sync service owns the retry schedule around the
/// compute-and-write pair.
pub fn auto_backup(key: &ContentKey, email: &str, user_id: &UserId) -> Result<KeyBackup, CryptoError> {
    let secret = kdf::derive_auto_secret(email, user_id);
    password_backup(key, &secret)
}

/// Restore a key from an automatic cloud backup, if no local key exists.
///
/// Idempotent: returns `Ok(false)` without touching anything when the device
/// already holds a key. Returns `Ok(true)` after installing a restored key.
pub fn auto_restore(
    keystore: &KeyStore,
    user_id: &UserId,
    email: &str,
    backup: &KeyBackup,
) -> Result<bool, CryptoError> {
    if keystore.has_key(user_id)? {
        return Ok(false);
    }

    let secret = kdf::derive_auto_secret(email, user_id);
    let key = password_restore(backup, &secret)?;
    keystore.install_key(user_id, &key)?;
    Ok(true)
}
