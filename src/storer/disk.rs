//! On-disk session storage, one file per session.
//!
//! Expiry is derived from each file's modification time plus max-age, so no
//! timestamp is stored alongside the value and reads need no extra I/O.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Cleaner, ExpiryPolicy, Storer, Sweeper};
use crate::clock::{Clock, SystemClock};
use crate::error::OverseerError;
use crate::session::valid_key;
use crate::Result;

#[derive(Debug)]
struct DiskState {
    dir: PathBuf,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    /// Guards every file operation in `dir`.
    lock: RwLock<()>,
}

impl DiskState {
    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Modification time of `path`, or `None` if the file is gone.
    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta
                .modified()
                .map(Some)
                .map_err(OverseerError::io("stat")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OverseerError::io("stat")(e)),
        }
    }

    async fn is_live(&self, path: &Path, now: SystemTime) -> Result<bool> {
        Ok(match self.modified(path).await? {
            Some(mtime) => !self.policy.is_expired(mtime, now),
            None => false,
        })
    }

    /// Set the file's mtime to the clock's current time.
    async fn touch(&self, path: PathBuf) -> Result<()> {
        let now = self.clock.now();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.set_modified(now)
        })
        .await
        .map_err(|e| OverseerError::io("touch")(std::io::Error::other(e)))?
        .map_err(OverseerError::io("touch"))
    }

    /// Keys of every session file, expired or not.
    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(OverseerError::io("list"))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(OverseerError::io("list"))? {
            if let Some(name) = entry.file_name().to_str() {
                if valid_key(name) {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn clean(&self) -> Result<usize> {
        let now = self.clock.now();

        // Scan unlocked; each candidate is rechecked under the write lock.
        let mut expired = Vec::new();
        for key in self.keys().await? {
            let path = self.path(&key);
            if let Some(mtime) = self.modified(&path).await? {
                if self.policy.is_expired(mtime, now) {
                    expired.push(path);
                }
            }
        }

        let mut evicted = 0;
        for path in expired {
            let _guard = self.lock.write().await;
            // renewed since the scan
            if self.is_live(&path, now).await? {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => evicted += 1,
                // removed out-of-band
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(OverseerError::io("clean")(e)),
            }
        }

        if evicted > 0 {
            debug!("disk storer evicted {} expired session(s)", evicted);
        }
        Ok(evicted)
    }
}

/// Session storage as files in a directory. Survives restarts.
#[derive(Debug)]
pub struct DiskStorer {
    state: Arc<DiskState>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl DiskStorer {
    /// Create a storer in `dir`, creating the directory if needed. Entries
    /// live for `max_age` and are swept every `clean_interval`; pass zero
    /// for both to never expire.
    pub fn new(
        dir: impl Into<PathBuf>,
        max_age: Duration,
        clean_interval: Duration,
    ) -> Result<Self> {
        Self::with_clock(
            dir,
            ExpiryPolicy::new(max_age, clean_interval)?,
            Arc::new(SystemClock),
        )
    }

    /// Create a storer in `dir` with a two-day max-age swept hourly.
    pub fn with_defaults(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_clock(dir, ExpiryPolicy::default(), Arc::new(SystemClock))
    }

    /// Create a storer with an explicit policy and time source.
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        policy: ExpiryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(OverseerError::Config("disk storer directory must be set".into()));
        }
        std::fs::create_dir_all(&dir).map_err(OverseerError::io("create directory"))?;

        Ok(Self {
            state: Arc::new(DiskState {
                dir,
                policy,
                clock,
                lock: RwLock::new(()),
            }),
            sweeper: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.state.dir
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.state.policy
    }
}

#[async_trait]
impl Storer for DiskStorer {
    async fn get(&self, key: &str) -> Result<String> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let path = self.state.path(key);
        let _guard = self.state.lock.read().await;

        if !self.state.is_live(&path, self.state.clock.now()).await? {
            return Err(OverseerError::NoSession);
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(OverseerError::NoSession),
            Err(e) => Err(OverseerError::io("get")(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let path = self.state.path(key);
        let _guard = self.state.lock.write().await;

        tokio::fs::write(&path, value)
            .await
            .map_err(OverseerError::io("set"))?;
        self.state.touch(path).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let path = self.state.path(key);
        let _guard = self.state.lock.write().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(OverseerError::NoSession),
            Err(e) => Err(OverseerError::io("del")(e)),
        }
    }

    async fn reset_expiry(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let path = self.state.path(key);
        let _guard = self.state.lock.write().await;

        if !self.state.is_live(&path, self.state.clock.now()).await? {
            return Err(OverseerError::NoSession);
        }
        self.state.touch(path).await
    }

    async fn all(&self) -> Result<Vec<String>> {
        let now = self.state.clock.now();
        let _guard = self.state.lock.read().await;

        let mut live = Vec::new();
        for key in self.state.keys().await? {
            if self.state.is_live(&self.state.path(&key), now).await? {
                live.push(key);
            }
        }
        Ok(live)
    }
}

#[async_trait]
impl Cleaner for DiskStorer {
    fn start_cleaner(&self) -> Result<()> {
        if self.state.policy.is_persistent() {
            debug!("disk storer never expires, sweeper not started");
            return Ok(());
        }

        let mut slot = self.sweeper.lock().map_err(|_| OverseerError::LockPoisoned)?;
        if slot.is_some() {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let sweeper = Sweeper::spawn("disk", self.state.policy.clean_interval(), move || {
            let state = Arc::clone(&state);
            async move {
                if let Err(e) = state.clean().await {
                    warn!("disk sweep failed: {}", e);
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
        self.state.clean().await
    }

    fn is_cleaning(&self) -> bool {
        self.sweeper
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|sweeper| !sweeper.is_finished()))
            .unwrap_or(false)
    }
}
