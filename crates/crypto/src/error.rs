//! Error types for the veilchat-crypto crate.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The provided key material is invalid (wrong length, malformed, etc.).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key, tampered ciphertext, malformed blob).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// A recovery code's integrity checksum did not match its key bytes.
    #[error("recovery code checksum mismatch")]
    ChecksumMismatch,

    /// A backup could not be restored (wrong password or corrupted record).
    #[error("restore failed: {0}")]
    RestoreFailed(String),

    /// Local key-value storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<rusqlite::Error> for CryptoError {
    fn from(err: rusqlite::Error) -> Self {
        CryptoError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

impl From<CryptoError> for veilchat_shared::error::VeilchatError {
    fn from(err: CryptoError) -> Self {
        veilchat_shared::error::VeilchatError::Crypto(err.to_string())
    }
}
