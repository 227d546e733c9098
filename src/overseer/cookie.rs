//! Encrypted-cookie overseer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{CookieWriter, Overseer};
use crate::cipher::Cipher;
use crate::clock::{Clock, SystemClock};
use crate::error::OverseerError;
use crate::session::{CookieBuffer, CookieOptions};
use crate::Result;

/// Keeps the whole session value in the cookie, sealed with AES-GCM.
///
/// There is no server-side state, so sessions cannot be regenerated and have
/// no identifier.
#[derive(Debug)]
pub struct CookieOverseer {
    cookie: CookieWriter,
    cipher: Cipher,
}

impl CookieOverseer {
    /// Create an overseer. `secret_key` must be 16 or 32 bytes.
    pub fn new(options: CookieOptions, secret_key: &[u8]) -> Result<Self> {
        Self::with_clock(options, secret_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        options: CookieOptions,
        secret_key: &[u8],
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let cipher = Cipher::new(secret_key)?;
        let cookie = CookieWriter::new(options, clock)?;
        debug!("cookie overseer ready, {:?}", cipher);
        Ok(Self { cookie, cipher })
    }

    pub fn options(&self) -> &CookieOptions {
        self.cookie.options()
    }
}

#[async_trait]
impl Overseer for CookieOverseer {
    async fn get(&self, cookies: &CookieBuffer) -> Result<String> {
        let sealed = self.cookie.read(cookies)?;
        self.cipher.decode(&sealed)
    }

    async fn set(&self, cookies: &CookieBuffer, value: &str) -> Result<()> {
        let sealed = self.cipher.encode(value)?;
        self.cookie.write(cookies, &sealed)
    }

    async fn del(&self, cookies: &CookieBuffer) -> Result<()> {
        match self.cookie.read(cookies) {
            Ok(_) => self.cookie.delete(cookies),
            Err(OverseerError::NoSession) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn regenerate(&self, _cookies: &CookieBuffer) -> Result<()> {
        Err(OverseerError::Unsupported("regenerate"))
    }

    async fn session_id(&self, _cookies: &CookieBuffer) -> Result<String> {
        Err(OverseerError::Unsupported("session id"))
    }

    async fn reset_expiry(&self, cookies: &CookieBuffer) -> Result<()> {
        let sealed = self.cookie.read(cookies)?;
        self.cipher.decode(&sealed)?;
        self.cookie.refresh(cookies, &sealed)
    }
}
