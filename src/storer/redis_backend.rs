//! Redis session storage.
//!
//! Expiry is delegated to Redis key TTLs, so there is no local sweeper.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::{check_max_age, Storer, DEFAULT_MAX_AGE};
use crate::error::OverseerError;
use crate::session::valid_key;
use crate::Result;

const SCAN_BATCH: usize = 100;

/// Session storage in Redis.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use session_overseer::storer::RedisStorer;
///
/// # async fn example() -> session_overseer::Result<()> {
/// let storer = RedisStorer::new("redis://127.0.0.1/", Duration::from_secs(3600))
///     .await?
///     .with_key_prefix("sessions");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStorer {
    connection: ConnectionManager,
    max_age: Duration,
    key_prefix: String,
}

impl RedisStorer {
    /// Connect to `url`. Keys expire `max_age` after their last write or
    /// renewal; a zero max-age stores keys without a TTL.
    pub async fn new(url: &str, max_age: Duration) -> Result<Self> {
        if !max_age.is_zero() && max_age.as_secs() == 0 {
            return Err(OverseerError::Config(
                "redis max age must be at least one second".into(),
            ));
        }
        check_max_age("redis", max_age)?;

        let client = redis::Client::open(url).map_err(OverseerError::redis("connect"))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(OverseerError::redis("connect"))?;

        debug!("redis storer connected, max age {:?}", max_age);
        Ok(Self {
            connection,
            max_age,
            key_prefix: String::new(),
        })
    }

    /// Connect with a two-day max-age.
    pub async fn with_defaults(url: &str) -> Result<Self> {
        Self::new(url, DEFAULT_MAX_AGE).await
    }

    /// Namespace every key under `prefix:`.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn build_key(&self, key: &str) -> String {
        full_key(&self.key_prefix, key)
    }
}

impl fmt::Debug for RedisStorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorer")
            .field("max_age", &self.max_age)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

fn full_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

fn scan_pattern(prefix: &str) -> String {
    full_key(prefix, "*")
}

/// Recover the session key from a stored key, dropping anything that is not
/// a session under this prefix.
fn session_key<'a>(prefix: &str, stored: &'a str) -> Option<&'a str> {
    let key = if prefix.is_empty() {
        stored
    } else {
        stored.strip_prefix(prefix)?.strip_prefix(':')?
    };
    valid_key(key).then_some(key)
}

#[async_trait]
impl Storer for RedisStorer {
    async fn get(&self, key: &str) -> Result<String> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .get(self.build_key(key))
            .await
            .map_err(OverseerError::redis("get"))?;

        value.ok_or(OverseerError::NoSession)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let mut conn = self.connection.clone();
        let full_key = self.build_key(key);

        if self.max_age.is_zero() {
            let _: () = conn
                .set(full_key, value)
                .await
                .map_err(OverseerError::redis("set"))?;
        } else {
            let _: () = conn
                .set_ex(full_key, value, self.max_age.as_secs())
                .await
                .map_err(OverseerError::redis("set"))?;
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let mut conn = self.connection.clone();
        let removed: i64 = conn
            .del(self.build_key(key))
            .await
            .map_err(OverseerError::redis("del"))?;

        if removed == 0 {
            return Err(OverseerError::NoSession);
        }
        Ok(())
    }

    async fn reset_expiry(&self, key: &str) -> Result<()> {
        if !valid_key(key) {
            return Err(OverseerError::NoSession);
        }

        let mut conn = self.connection.clone();
        let full_key = self.build_key(key);

        let found: bool = if self.max_age.is_zero() {
            conn.exists(full_key)
                .await
                .map_err(OverseerError::redis("reset expiry"))?
        } else {
            conn.expire(full_key, self.max_age.as_secs() as i64)
                .await
                .map_err(OverseerError::redis("reset expiry"))?
        };

        if !found {
            return Err(OverseerError::NoSession);
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = scan_pattern(&self.key_prefix);

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(OverseerError::redis("scan"))?;

            keys.extend(
                batch
                    .iter()
                    .filter_map(|stored| session_key(&self.key_prefix, stored))
                    .map(str::to_string),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
