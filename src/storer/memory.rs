//! In-process session storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Cleaner, ExpiryPolicy, Storer, Sweeper};
use crate::clock::{Clock, SystemClock};
use crate::error::OverseerError;
use crate::session::valid_key;
use crate::Result;

/// A stored session value and its absolute expiry.
#[derive(Debug, Clone)]
struct MemorySession {
    value: String,
    expires: Option<SystemTime>,
}

impl MemorySession {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.map(|at| now > at).unwrap_or(false)
    }
}

#[derive(Debug)]
struct MemoryState {
    sessions: RwLock<HashMap<String, MemorySession>>,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryState {
    fn clean(&self) -> Result<usize> {
        let now = self.clock.now();

        // Find candidates under the shared lock, then evict one at a time so
        // request-path readers are never blocked for the whole scan.
        let expired: Vec<String> = {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| OverseerError::LockPoisoned)?;
            sessions
                .iter()
                .filter(|(_, session)| session.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut evicted = 0;
        for key in expired {
            let mut sessions = self
                .sessions
                .write()
                .map_err(|_| OverseerError::LockPoisoned)?;
            // the entry may have been renewed since the scan
            if sessions.get(&key).is_some_and(|s| s.is_expired(now)) {
                sessions.remove(&key);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!("memory storer evicted {} expired session(s)", evicted);
        }
        Ok(evicted)
    }
}

/// Session storage in a process-wide map. Fast, but lost on restart.
#[derive(Debug)]
pub struct MemoryStorer {
    state: Arc<MemoryState>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl MemoryStorer {
    /// Create a storer whose entries live for `max_age` and are swept every
    /// `clean_interval`. Pass zero for both to never expire.
    pub fn new(max_age: Duration, clean_interval: Duration) -> Result<Self> {
        Ok(Self::with_clock(
            ExpiryPolicy::new(max_age, clean_interval)?,
            Arc::new(SystemClock),
        ))
    }

    /// Create a storer with a two-day max-age swept hourly.
    pub fn with_defaults() -> Self {
        Self::with_clock(ExpiryPolicy::default(), Arc::new(SystemClock))
    }

    /// Create a storer with an explicit policy and time source.
    pub fn with_clock(policy: ExpiryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(MemoryState {
                sessions: RwLock::new(HashMap::new()),
                policy,
                clock,
            }),
            sweeper: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.state.policy
    }

    /// Number of stored entries, expired or not.
    pub fn count(&self) -> usize {
        self.state.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for MemoryStorer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl Storer for MemoryStorer {
    async fn get(&self, key: &str) -> Result<String> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let sessions = self
            .state
            .sessions
            .read()
            .map_err(|_| OverseerError::LockPoisoned)?;

        match sessions.get(key) {
            Some(session) if !session.is_expired(self.state.clock.now()) => {
                Ok(session.value.clone())
            }
            _ => Err(OverseerError::NoSession),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let expires = self.state.policy.expires_at(self.state.clock.now());
        let mut sessions = self
            .state
            .sessions
            .write()
            .map_err(|_| OverseerError::LockPoisoned)?;

        sessions.insert(
            key.to_string(),
            MemorySession {
                value: value.to_string(),
                expires,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let mut sessions = self
            .state
            .sessions
            .write()
            .map_err(|_| OverseerError::LockPoisoned)?;

        sessions
            .remove(key)
            .map(|_| ())
            .ok_or(OverseerError::NoSession)
    }

    async fn reset_expiry(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let now = self.state.clock.now();
        let mut sessions = self
            .state
            .sessions
            .write()
            .map_err(|_| OverseerError::LockPoisoned)?;

        match sessions.get_mut(key) {
            Some(session) if !session.is_expired(now) => {
                session.expires = self.state.policy.expires_at(now);
                Ok(())
            }
            _ => Err(OverseerError::NoSession),
        }
    }

    async fn all(&self) -> Result<Vec<String>> {
        let now = self.state.clock.now();
        let sessions = self
            .state
            .sessions
            .read()
            .map_err(|_| OverseerError::LockPoisoned)?;

        Ok(sessions
            .iter()
            .filter(|(_, session)| !session.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[async_trait]
impl Cleaner for MemoryStorer {
    fn start_cleaner(&self) -> Result<()> {
        if self.state.policy.is_persistent() {
            debug!("memory storer never expires, sweeper not started");
            return Ok(());
        }

        let mut slot = self.sweeper.lock().map_err(|_| OverseerError::LockPoisoned)?;
        if slot.is_some() {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let sweeper = Sweeper::spawn("memory", self.state.policy.clean_interval(), move || {
            let state = Arc::clone(&state);
            async move {
                if let Err(e) = state.clean() {
                    warn!("memory sweep failed: {}", e);
                }
            }
        })?;
        *slot = Some(sweeper);
        Ok(())
    }

    async fn stop_cleaner(&self) {
        let sweeper = self.sweeper.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }
    }

    async fn clean(&self) -> Result<usize> {
        self.state.clean()
    }

    fn is_cleaning(&self) -> bool {
        self.sweeper
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|sweeper| !sweeper.is_finished()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::new_session_id;

    const MAX_AGE: Duration = Duration::from_secs(60);

    fn storer() -> (MemoryStorer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let policy = ExpiryPolicy::new(MAX_AGE, Duration::from_secs(10)).unwrap();
        (MemoryStorer::with_clock(policy, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get() {
        let (storer, _) = storer();
        let key = new_session_id();

        storer.set(&key, "hello").await.unwrap();
        assert_eq!(storer.get(&key).await.unwrap(), "hello");

        storer.set(&key, "spiders").await.unwrap();
        assert_eq!(storer.get(&key).await.unwrap(), "spiders");
        assert_eq!(storer.count(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_no_session() {
        let (storer, _) = storer();
        let err = storer.get(&new_session_id()).await.unwrap_err();
        assert!(err.is_no_session());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let (storer, _) = storer();
        assert!(storer.set("not-a-key", "v").await.unwrap_err().is_no_session());
        assert!(storer.get("not-a-key").await.unwrap_err().is_no_session());
        assert_eq!(storer.count(), 0);
    }

    #[tokio::test]
    async fn test_del() {
        let (storer, _) = storer();
        let key = new_session_id();
        storer.set(&key, "v").await.unwrap();

        storer.del(&key).await.unwrap();
        assert!(storer.get(&key).await.unwrap_err().is_no_session());
        assert!(storer.del(&key).await.unwrap_err().is_no_session());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_missing() {
        let (storer, clock) = storer();
        let key = new_session_id();
        storer.set(&key, "v").await.unwrap();

        clock.advance(MAX_AGE + Duration::from_secs(1));
        assert!(storer.get(&key).await.unwrap_err().is_no_session());
        assert!(storer.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_expiry_extends_lifetime() {
        let (storer, clock) = storer();
        let key = new_session_id();
        storer.set(&key, "v").await.unwrap();

        clock.advance(Duration::from_secs(50));
        storer.reset_expiry(&key).await.unwrap();
        clock.advance(Duration::from_secs(50));

        assert_eq!(storer.get(&key).await.unwrap(), "v");
    }

    #[tokio::test]
    async fn test_reset_expiry_missing() {
        let (storer, _) = storer();
        let err = storer.reset_expiry(&new_session_id()).await.unwrap_err();
        assert!(err.is_no_session());
        assert_eq!(storer.count(), 0);
    }

    #[tokio::test]
    async fn test_clean_removes_only_expired() {
        let (storer, clock) = storer();
        let old = new_session_id();
        let fresh = new_session_id();

        storer.set(&old, "old").await.unwrap();
        clock.advance(Duration::from_secs(40));
        storer.set(&fresh, "fresh").await.unwrap();
        clock.advance(Duration::from_secs(30));

        assert_eq!(storer.clean().await.unwrap(), 1);
        assert_eq!(storer.count(), 1);
        assert_eq!(storer.get(&fresh).await.unwrap(), "fresh");
        assert_eq!(storer.all().await.unwrap(), vec![fresh]);
    }

    #[tokio::test]
    async fn test_persistent_never_expires() {
        let clock = Arc::new(ManualClock::default());
        let storer = MemoryStorer::with_clock(ExpiryPolicy::persistent(), clock.clone());
        let key = new_session_id();
        storer.set(&key, "forever").await.unwrap();

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(storer.clean().await.unwrap(), 0);
        assert_eq!(storer.get(&key).await.unwrap(), "forever");

        // no sweeper for persistent storage
        storer.start_cleaner().unwrap();
        assert!(storer.sweeper.lock().unwrap().is_none());
    }

    #[test]
    fn test_mismatched_policy_rejected() {
        assert!(MemoryStorer::new(Duration::from_secs(1), Duration::ZERO).is_err());
        assert!(MemoryStorer::new(Duration::ZERO, Duration::ZERO).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let (storer, clock) = storer();
        let key = new_session_id();
        storer.set(&key, "v").await.unwrap();
        clock.advance(MAX_AGE + Duration::from_secs(1));

        storer.start_cleaner().unwrap();
        // a second start must not spawn another loop
        storer.start_cleaner().unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(storer.count(), 0);

        storer.stop_cleaner().await;
        assert!(storer.sweeper.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let (storer, _) = storer();
        let storer = Arc::new(storer);
        let mut handles = vec![];

        for i in 0..100 {
            let storer = Arc::clone(&storer);
            handles.push(tokio::spawn(async move {
                let key = new_session_id();
                storer.set(&key, &i.to_string()).await.unwrap();
                key
            }));
        }

        for handle in handles {
            let key = handle.await.unwrap();
            assert!(storer.get(&key).await.is_ok());
        }
        assert_eq!(storer.count(), 100);
    }
}
