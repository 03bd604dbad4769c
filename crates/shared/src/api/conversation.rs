use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message as stored in the remote conversation store.
///
/// `content` holds plaintext when `encrypted` is false and an encrypted blob
/// when it is true. Conversations written before encryption was introduced
/// carry no `encrypted` field, so it defaults to false on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub encrypted: bool,
}
