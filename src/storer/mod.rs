//! Backend-agnostic keyed session storage.
//!
//! A [`Storer`] maps session identifiers to opaque string values with
//! per-key expiry. It knows nothing about cookies or HTTP.
//!
//! | Backend | Expiry | Sweeper |
//! |---|---|---|
//! | [`MemoryStorer`] | per-entry timestamp | yes |
//! | [`DiskStorer`] | file mtime + max-age | yes |
//! | [`RedisStorer`] | native key TTL | no |

use async_trait::async_trait;

use crate::Result;

mod disk;
mod expiry;
mod memory;
mod redis_backend;
mod sweeper;

pub use self::disk::DiskStorer;
pub use self::expiry::{ExpiryPolicy, DEFAULT_CLEAN_INTERVAL, DEFAULT_MAX_AGE, MAX_AGE_LIMIT};
pub(crate) use self::expiry::check_max_age;
pub use self::memory::MemoryStorer;
pub use self::redis_backend::RedisStorer;
pub use self::sweeper::Sweeper;

/// Keyed session storage with per-key expiry.
///
/// Keys that do not have the session identifier shape, missing keys and
/// expired keys all produce [`OverseerError::NoSession`](crate::OverseerError::NoSession).
#[async_trait]
pub trait Storer: Send + Sync {
    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> Result<String>;

    /// Create or overwrite `key`, restarting its lifetime.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`.
    async fn del(&self, key: &str) -> Result<()>;

    /// Restart the lifetime of `key` without touching its value.
    async fn reset_expiry(&self, key: &str) -> Result<()>;

    /// Every live key.
    async fn all(&self) -> Result<Vec<String>>;
}

/// Storers that evict expired entries with a background sweeper.
#[async_trait]
pub trait Cleaner: Send + Sync {
    /// Start the sweeper. Does nothing when one is already running or when
    /// entries never expire.
    fn start_cleaner(&self) -> Result<()>;

    /// Stop the sweeper and wait for it to exit.
    async fn stop_cleaner(&self);

    /// Run one sweep now, returning the number of evicted entries.
    async fn clean(&self) -> Result<usize>;

    /// True while a sweeper task is running.
    fn is_cleaning(&self) -> bool;
}
