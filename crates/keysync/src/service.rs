//! Background key sync service.
//!
//! A per-session service that reconciles the local key store with the remote
//! profile's backup fields: if a local key exists and the profile carries no
//! backup, one is computed and written. The service moves through
//! Idle → Checking → BackingUp and back; every trigger lands in Checking,
//! where overlapping and rapid-fire triggers are collapsed by an atomic
//! in-progress claim and a wall-clock rate limit.
//!
//! Constructed once per login session, started on login, stopped on logout.
//! The host wires its environment signals (network reconnect, foreground)
//! to [`KeySyncHandle::trigger`]; key-creation events arrive through the key
//! store's own broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::profile::ProfileStore;
use veilchat_crypto::backup;
use veilchat_crypto::keystore::{KeyEvent, KeyStore};
use veilchat_shared::ids::UserId;

/// Timing and retry knobs for the sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval of the periodic check timer.
    pub check_interval: Duration,
    /// Minimum wall-clock gap between two check attempts.
    pub min_retry_delay: Duration,
    /// In-process attempts per backup before giving up until the next trigger.
    pub backup_attempts: u32,
    /// Base delay of the exponential backoff between backup attempts.
    pub backoff_base: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5 * 60),
            min_retry_delay: Duration::from_secs(30),
            backup_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// What caused a sync check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Timer,
    NetworkReconnected,
    Foreground,
    KeyCreated,
    Manual,
}

enum SyncCommand {
    Trigger(SyncTrigger),
    Stop,
}

/// Handle for firing triggers at a running sync service and stopping it.
#[derive(Clone)]
pub struct KeySyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
}

impl KeySyncHandle {
    /// Fire a named trigger. Fails with `NotRunning` after `stop`.
    pub async fn trigger(&self, trigger: SyncTrigger) -> Result<(), SyncError> {
        self.command_tx
            .send(SyncCommand::Trigger(trigger))
            .await
            .map_err(|_| SyncError::NotRunning)
    }

    /// Stop the service. Idempotent; safe to call when the service was never
    /// started or has already stopped. An in-flight backup attempt is not
    /// cancelled — it runs its own retry loop to completion.
    pub async fn stop(&self) {
        let _ = self.command_tx.send(SyncCommand::Stop).await;
    }
}

/// Background service ensuring the local key has a cloud backup.
pub struct KeySyncService {
    keystore: Arc<KeyStore>,
    profiles: Arc<dyn ProfileStore>,
    user_id: UserId,
    email: String,
    config: SyncConfig,
    command_rx: mpsc::Receiver<SyncCommand>,
    in_progress: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
}

/// Create a sync service and its command handle for one login session.
///
/// The caller owns scheduling: `tokio::spawn(service.run())` on login, then
/// `handle.stop().await` on logout.
pub fn create_key_sync_service(
    keystore: Arc<KeyStore>,
    profiles: Arc<dyn ProfileStore>,
    user_id: UserId,
    email: String,
    config: SyncConfig,
) -> (KeySyncHandle, KeySyncService) {
    let (command_tx, command_rx) = mpsc::channel(16);

    let handle = KeySyncHandle { command_tx };
    let service = KeySyncService {
        keystore,
        profiles,
        user_id,
        email,
        config,
        command_rx,
        in_progress: AtomicBool::new(false),
        last_attempt: Mutex::new(None),
    };

    (handle, service)
}

/// Releases the in-progress claim when a check completes or bails out.
struct ClaimGuard<'a>(&'a AtomicBool);

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl KeySyncService {
    /// Run the service event loop until stopped.
    ///
    /// The periodic timer fires immediately on entry, so starting the service
    /// doubles as the initial sync check of the session.
    pub async fn run(mut self) {
        info!("key sync service started for user {}", self.user_id);

        let mut check_interval = tokio::time::interval(self.config.check_interval);
        let mut key_events = self.keystore.subscribe();

        loop {
            tokio::select! {
                _ = check_interval.tick() => {
                    self.check_once(SyncTrigger::Timer).await;
                }
                event = key_events.recv() => {
                    match event {
                        Ok(KeyEvent::Created(user_id)) if user_id == self.user_id => {
                            self.check_once(SyncTrigger::KeyCreated).await;
                        }
                        Ok(KeyEvent::Created(_)) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            // Missed events are covered by the periodic timer.
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("key event channel closed");
                            break;
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SyncCommand::Trigger(trigger)) => {
                            self.check_once(trigger).await;
                        }
                        Some(SyncCommand::Stop) | None => break,
                    }
                }
            }
        }

        info!("key sync service stopped for user {}", self.user_id);
    }

    /// Run a single sync check.
    ///
    /// Collapses concurrent and rapid-fire triggers: the check is skipped when
    /// another check holds the in-progress claim or the previous attempt was
    /// within the rate-limit window. Failures are logged, never surfaced.
    pub async fn check_once(&self, trigger: SyncTrigger) {
        // Atomic claim: two near-simultaneous triggers cannot both pass, even
        // across the await points below.
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!(?trigger, "sync check already in progress, skipping");
            return;
        }
        let _claim = ClaimGuard(&self.in_progress);

        if !self.rate_limit_elapsed() {
            debug!(?trigger, "sync check rate limited, skipping");
            return;
        }

        if let Err(e) = self.run_check(trigger).await {
            warn!("key sync check failed: {e}");
        }
    }

    fn rate_limit_elapsed(&self) -> bool {
        let mut last = self
            .last_attempt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.config.min_retry_delay {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    async fn run_check(&self, trigger: SyncTrigger) -> Result<(), SyncError> {
        if !self.keystore.has_key(&self.user_id)? {
            debug!(?trigger, "no local key, nothing to back up");
            return Ok(());
        }

        // None means "no record or offline"; either way a fresh backup write
        // is the only safe next step, and it is last-writer-wins by contract.
        if let Some(profile) = self.profiles.get_profile(&self.user_id).await? {
            if profile.has_key_backup() {
                debug!(?trigger, "cloud backup already present, skipping");
                return Ok(());
            }
        }

        self.back_up_key(trigger).await;
        Ok(())
    }

    /// BackingUp state: bounded attempts with exponential backoff. Exhaustion
    /// is logged only; the periodic timer is the retry mechanism across
    /// triggers.
    async fn back_up_key(&self, trigger: SyncTrigger) {
        info!(?trigger, "backing up encryption key for user {}", self.user_id);

        for attempt in 0..self.config.backup_attempts {
            let result = self.try_backup_write().await;

            match result {
                Ok(()) => {
                    info!("encryption key backed up for user {}", self.user_id);
                    return;
                }
                Err(e) if attempt + 1 < self.config.backup_attempts => {
                    let backoff = self.config.backoff_base * (1u32 << attempt);
                    warn!(
                        "key backup attempt {}/{} failed: {e}, retrying in {backoff:?}",
                        attempt + 1,
                        self.config.backup_attempts,
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(
                        "key backup failed after {} attempts: {e}; will retry on a later trigger",
                        self.config.backup_attempts,
                    );
                }
            }
        }
    }

    async fn try_backup_write(&self) -> Result<(), SyncError> {
        let key = self.keystore.get_or_create_key(&self.user_id)?;
        let record = backup::auto_backup(&key, &self.email, &self.user_id)?;
        self.profiles
            .update_key_backup(&self.user_id, &record)
            .await
    }
}
