//! Server-side storage overseer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{CookieWriter, Overseer};
use crate::clock::{Clock, SystemClock};
use crate::error::OverseerError;
use crate::session::{new_session_id, valid_key, CookieBuffer, CookieOptions};
use crate::storer::Storer;
use crate::Result;

/// Keeps the session value in a [`Storer`]; the cookie only carries the
/// session identifier.
pub struct StorageOverseer {
    cookie: CookieWriter,
    storer: Arc<dyn Storer>,
}

impl StorageOverseer {
    pub fn new(options: CookieOptions, storer: Arc<dyn Storer>) -> Result<Self> {
        Self::with_clock(options, storer, Arc::new(SystemClock))
    }

    pub fn with_clock(
        options: CookieOptions,
        storer: Arc<dyn Storer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let cookie = CookieWriter::new(options, clock)?;
        Ok(Self { cookie, storer })
    }

    pub fn options(&self) -> &CookieOptions {
        self.cookie.options()
    }

    pub fn storer(&self) -> &Arc<dyn Storer> {
        &self.storer
    }

    /// Session identifier from the cookie. Anything that is not a well-formed
    /// key is treated as no session at all.
    fn current_id(&self, cookies: &CookieBuffer) -> Result<String> {
        let id = self.cookie.read(cookies)?;
        if !valid_key(&id) {
            debug!("ignoring malformed session id");
            return Err(OverseerError::NoSession);
        }
        Ok(id)
    }
}

impl std::fmt::Debug for StorageOverseer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOverseer")
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Overseer for StorageOverseer {
    async fn get(&self, cookies: &CookieBuffer) -> Result<String> {
        let id = self.current_id(cookies)?;
        self.storer.get(&id).await
    }

    async fn set(&self, cookies: &CookieBuffer, value: &str) -> Result<()> {
        let id = match self.current_id(cookies) {
            Ok(id) => id,
            Err(OverseerError::NoSession) => {
                let id = new_session_id();
                debug!("creating session {}", id);
                id
            }
            Err(e) => return Err(e),
        };

        self.storer.set(&id, value).await?;
        self.cookie.write(cookies, &id)
    }

    async fn del(&self, cookies: &CookieBuffer) -> Result<()> {
        let id = match self.current_id(cookies) {
            Ok(id) => id,
            Err(OverseerError::NoSession) => return Ok(()),
            Err(e) => return Err(e),
        };

        match self.storer.del(&id).await {
            Ok(()) | Err(OverseerError::NoSession) => {}
            Err(e) => return Err(e),
        }
        self.cookie.delete(cookies)
    }

    async fn regenerate(&self, cookies: &CookieBuffer) -> Result<()> {
        let old_id = self.current_id(cookies)?;
        let value = self.storer.get(&old_id).await?;

        match self.storer.del(&old_id).await {
            Ok(()) | Err(OverseerError::NoSession) => {}
            Err(e) => return Err(e),
        }

        let new_id = new_session_id();
        self.storer.set(&new_id, &value).await?;
        debug!("regenerated session {} -> {}", old_id, new_id);
        self.cookie.write(cookies, &new_id)
    }

    async fn session_id(&self, cookies: &CookieBuffer) -> Result<String> {
        self.current_id(cookies)
    }

    async fn reset_expiry(&self, cookies: &CookieBuffer) -> Result<()> {
        let id = self.current_id(cookies)?;
        self.storer.reset_expiry(&id).await?;
        self.cookie.refresh(cookies, &id)
    }
}
