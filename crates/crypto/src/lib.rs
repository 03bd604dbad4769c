//! veilchat-crypto — client-side end-to-end encryption for Veilchat.
//!
//! Provides AES-256-GCM message encryption with a per-user content key,
//! PBKDF2-based key wrapping for backups, a local key store over injected
//! key-value persistence, three backup/restore codecs (password, recovery
//! code, automatic cloud), and a conversation adapter applied at the
//! persistence boundary.

pub mod backup;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod keystore;
pub mod store;
