//! Password key derivation for key backups.
//!
//! PBKDF2-HMAC-SHA256 stretches a password-like secret into an AES-256
//! wrapping key. The iteration count is a fixed brute-force cost multiplier,
//! not a tunable default; changing it would invalidate every existing backup.

use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::engine::{ContentKey, KEY_SIZE};
use crate::error::CryptoError;
use veilchat_shared::ids::UserId;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_SIZE: usize = 16;

const AUTO_SECRET_CONTEXT: &str = "veilchat-key-backup-v1";

/// Derive an AES-256 wrapping key from a secret and salt.
///
/// Deterministic for identical inputs. The salt must be at least 16 bytes.
pub fn derive_wrapping_key(secret: &str, salt: &[u8]) -> Result<ContentKey, CryptoError> {
    if salt.len() < SALT_SIZE {
        return Err(CryptoError::InvalidKey("salt too short".into()));
    }

    let mut output = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, PBKDF2_ITERATIONS, &mut output);
    Ok(ContentKey::from_bytes(output))
}

/// Generate a random 16-byte salt for key wrapping.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Derive the deterministic pseudo-password used for automatic cloud backups.
///
/// Computed as `base64(SHA-256(email:user_id:constant))`. Anyone who knows the
/// user's email, id, and this constant can recompute the secret; the wrapping
/// it produces protects against casual inspection of the profile store, not
/// against its operator.
pub fn derive_auto_secret(email: &str, user_id: &UserId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{email}:{user_id}:{AUTO_SECRET_CONTEXT}"));
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
