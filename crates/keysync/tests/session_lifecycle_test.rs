//! Session lifecycle integration test for veilchat-keysync.
//!
//! Walks one login session end to end: service start, lazy key creation,
//! automatic cloud backup, logout, and recovery of the backed-up key on a
//! second device.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use veilchat_crypto::backup::{self, KeyBackup};
use veilchat_crypto::conversation;
use veilchat_crypto::keystore::KeyStore;
use veilchat_crypto::store::MemoryKeyValueStore;
use veilchat_keysync::error::SyncError;
use veilchat_keysync::profile::ProfileStore;
use veilchat_keysync::service::{create_key_sync_service, SyncConfig};
use veilchat_shared::api::conversation::{Message, Role};
use veilchat_shared::api::profile::UserProfile;
use veilchat_shared::ids::UserId;

struct InMemoryProfileStore {
    profile: Mutex<Option<UserProfile>>,
    writes: AtomicUsize,
}

impl InMemoryProfileStore {
    fn new() -> Self {
        Self {
            profile: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    fn backup_record(&self) -> Option<KeyBackup> {
        let profile = self.profile.lock().unwrap();
        profile.as_ref().and_then(|p| {
            Some(KeyBackup {
                encrypted_key: p.encryption_key_backup.clone()?,
                salt: p.encryption_key_salt.clone()?,
            })
        })
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, _user_id: &UserId) -> Result<Option<UserProfile>, SyncError> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn update_key_backup(
        &self,
        user_id: &UserId,
        record: &KeyBackup,
    ) -> Result<(), SyncError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut profile = self.profile.lock().unwrap();
        *profile = Some(UserProfile {
            id: *user_id,
            email: "user@example.com".into(),
            display_name: "Test User".into(),
            encryption_key_backup: Some(record.encrypted_key.clone()),
            encryption_key_salt: Some(record.salt.clone()),
        });
        Ok(())
    }
}

fn test_config() -> SyncConfig {
    SyncConfig {
        check_interval: Duration::from_secs(60),
        min_retry_delay: Duration::ZERO,
        backup_attempts: 3,
        backoff_base: Duration::from_millis(1),
    }
}

async fn wait_for_backup(profiles: &InMemoryProfileStore) -> KeyBackup {
    for _ in 0..200 {
        if let Some(record) = profiles.backup_record() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no backup written within the deadline");
}

#[tokio::test]
async fn login_chat_logout_and_recover_on_new_device() {
    let user = UserId::new();
    let email = "user@example.com";
    let profiles = Arc::new(InMemoryProfileStore::new());

    // -- Login on device A: start the per-session sync service --
    let device_a = Arc::new(KeyStore::new(Box::new(MemoryKeyValueStore::new())));
    let (handle, service) = create_key_sync_service(
        device_a.clone(),
        profiles.clone(),
        user,
        email.into(),
        test_config(),
    );
    let worker = tokio::spawn(service.run());

    // -- First message encrypted: key is created lazily, event fires --
    let outgoing = vec![Message {
        role: Role::User,
        content: "first ever message".into(),
        timestamp: chrono::Utc::now(),
        encrypted: false,
    }];
    let stored = conversation::encrypt_conversation(&outgoing, &device_a, &user).unwrap();

    // -- The sync service notices and writes exactly one cloud backup --
    let record = wait_for_backup(&profiles).await;
    assert_eq!(profiles.writes.load(Ordering::SeqCst), 1);

    // -- Logout: stop the service, clear the local key --
    handle.stop().await;
    worker.await.unwrap();
    device_a.clear_key(&user).unwrap();

    // -- Login on device B: no local key, cloud backup present --
    let device_b = KeyStore::new(Box::new(MemoryKeyValueStore::new()));
    assert!(backup::auto_restore(&device_b, &user, email, &record).unwrap());

    let readable = conversation::decrypt_conversation(&stored, &device_b, &user).unwrap();
    assert_eq!(readable[0].content, "first ever message");
}
