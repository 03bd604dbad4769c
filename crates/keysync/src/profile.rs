//! Remote user-profile collaborator.

use async_trait::async_trait;

use crate::error::SyncError;
use veilchat_crypto::backup::KeyBackup;
use veilchat_shared::api::profile::UserProfile;
use veilchat_shared::ids::UserId;

/// Access to the remote profile store's key-backup fields.
///
/// `get_profile` returning `None` means "no record **or** offline" — callers
/// must treat it as unknown, not as confirmed absence. Backup writes are
/// last-writer-wins; there is no revision check on the two backup fields.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, SyncError>;

    async fn update_key_backup(
        &self,
        user_id: &UserId,
        backup: &KeyBackup,
    ) -> Result<(), SyncError>;
}
