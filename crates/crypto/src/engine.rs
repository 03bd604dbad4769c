//! Symmetric message encryption using AES-256-GCM.
//!
//! One 256-bit content key per user. Encrypted output is
//! `base64(nonce (12 bytes) || ciphertext || auth tag (16 bytes))`, carried as
//! a string so it can sit directly in a message's `content` field.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const NONCE_SIZE: usize = 12; // 96-bit nonce for AES-256-GCM
pub const KEY_SIZE: usize = 32; // 256-bit key

/// A 32-byte AES-256-GCM content key, securely wiped from memory on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ContentKey {
    pub(crate) fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

/// Generate a fresh random content key.
pub fn generate_key() -> ContentKey {
    let mut key = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut key);
    ContentKey { key }
}

/// Export a key as a base64 string for storage.
pub fn export_key(key: &ContentKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.key)
}

/// Import a previously exported key.
///
/// Round-trips exactly with [`export_key`]; malformed input fails with
/// `InvalidKey`.
pub fn import_key(exported: &str) -> Result<ContentKey, CryptoError> {
    let mut bytes = base64::engine::general_purpose::STANDARD
        .decode(exported)
        .map_err(|_| CryptoError::InvalidKey("exported key is not valid base64".into()))?;

    if bytes.len() != KEY_SIZE {
        bytes.zeroize();
        return Err(CryptoError::InvalidKey(format!(
            "exported key must be {KEY_SIZE} bytes"
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(ContentKey { key })
}

/// Encrypt a plaintext string under the given key.
///
/// A fresh random nonce is generated per call; it is never reused for a key.
pub fn encrypt(plaintext: &str, key: &ContentKey) -> Result<String, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(base64::engine::general_purpose::STANDARD.encode(combined))
}

/// Decrypt an encrypted blob produced by [`encrypt`].
///
/// Fails with `DecryptionFailed` on malformed base64, a blob too short to
/// contain a nonce, an authentication tag mismatch, or non-UTF-8 plaintext.
/// Partial plaintext is never returned.
pub fn decrypt(blob: &str, key: &ContentKey) -> Result<String, CryptoError> {
    let combined = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .map_err(|_| CryptoError::DecryptionFailed("blob is not valid base64".into()))?;

    if combined.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed(
            "blob too short to contain nonce".into(),
        ));
    }

    let (nonce_bytes, ciphertext_with_tag) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext_with_tag)
        .map_err(|_| CryptoError::DecryptionFailed("authentication failed".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailed("plaintext is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let blob = encrypt("the quick brown fox", &key).unwrap();
        let plaintext = decrypt(&blob, &key).unwrap();
        assert_eq!(plaintext, "the quick brown fox");
    }

    #[test]
    fn empty_string_roundtrip() {
        let key = generate_key();
        let blob = encrypt("", &key).unwrap();
        assert_eq!(decrypt(&blob, &key).unwrap(), "");
    }

    #[test]
    fn unicode_roundtrip() {
        let key = generate_key();
        let blob = encrypt("héllo wörld 🔑", &key).unwrap();
        assert_eq!(decrypt(&blob, &key).unwrap(), "héllo wörld 🔑");
    }

    #[test]
    fn encrypt_is_randomized() {
        let key = generate_key();
        let a = encrypt("same plaintext", &key).unwrap();
        let b = encrypt("same plaintext", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let key = generate_key();
        let other = generate_key();
        let blob = encrypt("secret", &key).unwrap();
        let result = decrypt(&blob, &other);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn flipping_any_ciphertext_bit_fails_decryption() {
        let key = generate_key();
        let blob = encrypt("tamper target", &key).unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&blob)
            .unwrap();

        // flip one bit in the ciphertext region (past the nonce)
        raw[NONCE_SIZE] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&raw);
        let result = decrypt(&tampered, &key);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn flipping_a_nonce_bit_fails_decryption() {
        let key = generate_key();
        let blob = encrypt("tamper target", &key).unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&blob)
            .unwrap();

        raw[0] ^= 0x80;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&raw);
        let result = decrypt(&tampered, &key);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn decrypt_invalid_base64_fails() {
        let key = generate_key();
        let result = decrypt("not!!valid@@base64", &key);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn decrypt_blob_shorter_than_nonce_fails() {
        let key = generate_key();
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 5]);
        let result = decrypt(&short, &key);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn export_import_roundtrip() {
        let key = generate_key();
        let exported = export_key(&key);
        let imported = import_key(&exported).unwrap();
        assert_eq!(imported.as_bytes(), key.as_bytes());
    }

    #[test]
    fn imported_key_decrypts_original_ciphertext() {
        let key = generate_key();
        let blob = encrypt("survives export", &key).unwrap();
        let imported = import_key(&export_key(&key)).unwrap();
        assert_eq!(decrypt(&blob, &imported).unwrap(), "survives export");
    }

    #[test]
    fn import_invalid_base64_fails() {
        let result = import_key("%%%not base64%%%");
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn import_wrong_length_fails() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = import_key(&short);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn content_key_debug_is_redacted() {
        let key = generate_key();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
    }
}
