//! Error types for the veilchat-keysync crate.

use thiserror::Error;
use veilchat_crypto::error::CryptoError;

/// Errors that can occur during key synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A cryptographic operation failed (not transient, never retried).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The remote profile store failed (transient; retried by the service's
    /// own schedule).
    #[error("profile store error: {0}")]
    Profile(String),

    /// The sync service has been stopped or was never started.
    #[error("sync service not running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_error_converts() {
        let err: SyncError = CryptoError::ChecksumMismatch.into();
        match err {
            SyncError::Crypto(_) => {}
            other => panic!("expected Crypto variant, got: {other:?}"),
        }
    }

    #[test]
    fn display_messages_are_human_readable() {
        let err = SyncError::Profile("timeout".into());
        assert!(err.to_string().contains("timeout"));

        let err = SyncError::NotRunning;
        assert!(!err.to_string().is_empty());
    }
}
