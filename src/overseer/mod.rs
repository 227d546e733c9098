//! Session overseers.
//!
//! An [`Overseer`] turns a request's [`CookieBuffer`] into session
//! get/set/delete/rotate operations. Two variants are provided:
//!
//! - [`CookieOverseer`]: the whole value lives in an encrypted cookie.
//! - [`StorageOverseer`]: the cookie holds a session identifier and the value
//!   lives in a [`Storer`](crate::storer::Storer).

use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::session::{CookieBuffer, CookieOptions};
use crate::Result;

mod cookie;
mod storage;

pub use self::cookie::CookieOverseer;
pub use self::storage::StorageOverseer;

/// Client-facing session operations for one request.
///
/// Read-path methods report a missing or expired session as
/// [`OverseerError::NoSession`](crate::OverseerError::NoSession).
#[async_trait]
pub trait Overseer: Send + Sync {
    /// Current session value.
    async fn get(&self, cookies: &CookieBuffer) -> Result<String>;

    /// Store `value`, creating the session on first use.
    async fn set(&self, cookies: &CookieBuffer, value: &str) -> Result<()>;

    /// Destroy the session. Does nothing if there is none.
    async fn del(&self, cookies: &CookieBuffer) -> Result<()>;

    /// Move the session to a fresh identifier, keeping its value. The old
    /// identifier stops working.
    async fn regenerate(&self, cookies: &CookieBuffer) -> Result<()>;

    /// Identifier of the current session.
    async fn session_id(&self, cookies: &CookieBuffer) -> Result<String>;

    /// Extend the session's lifetime without changing its value.
    async fn reset_expiry(&self, cookies: &CookieBuffer) -> Result<()>;
}

/// Session-cookie reads and writes shared by both overseers.
#[derive(Debug, Clone)]
pub(crate) struct CookieWriter {
    options: CookieOptions,
    clock: Arc<dyn Clock>,
}

impl CookieWriter {
    pub(crate) fn new(options: CookieOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, clock })
    }

    pub(crate) fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub(crate) fn read(&self, cookies: &CookieBuffer) -> Result<String> {
        self.options.value(cookies)
    }

    pub(crate) fn write(&self, cookies: &CookieBuffer, value: &str) -> Result<()> {
        cookies.set(self.options.make_cookie(value, self.clock.now()))
    }

    pub(crate) fn delete(&self, cookies: &CookieBuffer) -> Result<()> {
        cookies.set(self.options.deletion_cookie())
    }

    /// Re-issue `value` with a fresh expiry. Browser-session cookies carry no
    /// expiry, so there is nothing to refresh.
    pub(crate) fn refresh(&self, cookies: &CookieBuffer, value: &str) -> Result<()> {
        if self.options.max_age.is_zero() {
            return Ok(());
        }
        self.write(cookies, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_writer_rejects_bad_options() {
        let clock = Arc::new(ManualClock::default());
        let result = CookieWriter::new(CookieOptions::new().with_name(""), clock);
        assert!(result.is_err());
    }

    #[test]
    fn test_refresh_noop_without_max_age() {
        let writer = CookieWriter::new(CookieOptions::new(), Arc::new(ManualClock::default())).unwrap();
        let cookies = CookieBuffer::new();
        writer.refresh(&cookies, "value").unwrap();
        assert_eq!(cookies.pending_len(), 0);
    }

    #[test]
    fn test_refresh_moves_expiry_forward() {
        let clock = Arc::new(ManualClock::default());
        let options = CookieOptions::new().with_max_age(Duration::from_secs(60));
        let writer = CookieWriter::new(options, clock.clone()).unwrap();
        let cookies = CookieBuffer::new();

        writer.write(&cookies, "value").unwrap();
        let first = cookies.pending("id").unwrap().expires_datetime().unwrap();

        clock.advance(Duration::from_secs(30));
        writer.refresh(&cookies, "value").unwrap();
        let second = cookies.pending("id").unwrap().expires_datetime().unwrap();

        assert_eq!(second - first, ::cookie::time::Duration::seconds(30));
        assert_eq!(cookies.pending_len(), 1);
    }
}
