use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// User profile record held in the remote profile store.
///
/// The crypto subsystem reads and writes only the two key-backup fields;
/// everything else is owned by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub encryption_key_backup: Option<String>,
    pub encryption_key_salt: Option<String>,
}

impl UserProfile {
    /// Whether this profile carries a complete cloud key backup.
    ///
    /// Both fields must be present; a record with only one of them is treated
    /// as having no backup so the sync service will rewrite it.
    pub fn has_key_backup(&self) -> bool {
        self.encryption_key_backup.is_some() && self.encryption_key_salt.is_some()
    }
}
