//! Session cookie attributes.

use std::time::{Duration, SystemTime};

use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::{Cookie, SameSite};

use super::CookieBuffer;
use crate::error::OverseerError;
use crate::storer::{check_max_age, MAX_AGE_LIMIT};
use crate::Result;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "id";

/// How the session cookie is named and shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Cookie name.
    pub name: String,
    /// Optional `Domain` attribute.
    pub domain: Option<String>,
    /// `Path` attribute.
    pub path: String,
    /// Cookie lifetime. Zero means a browser-session cookie with no
    /// `Max-Age`/`Expires`.
    pub max_age: Duration,
    /// Send only over HTTPS.
    pub secure: bool,
    /// Hide from client-side scripts.
    pub http_only: bool,
    /// Optional `SameSite` attribute.
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            max_age: Duration::ZERO,
            secure: true,
            http_only: true,
            same_site: None,
        }
    }
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Reject options that can never produce a usable cookie.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(OverseerError::Config("cookie name must not be empty".into()));
        }
        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | '=' | ','))
        {
            return Err(OverseerError::Config(format!(
                "cookie name contains invalid characters: {:?}",
                self.name
            )));
        }
        if !self.max_age.is_zero() && self.max_age.as_secs() == 0 {
            return Err(OverseerError::Config(
                "cookie max age must be zero or at least one second".into(),
            ));
        }
        check_max_age("cookie", self.max_age)
    }

    /// Build the session cookie carrying `value`. When a max-age is
    /// configured, `Expires` is set to `now + max_age` as well. A max-age
    /// above [`MAX_AGE_LIMIT`] is clamped to it.
    pub fn make_cookie(&self, value: impl Into<String>, now: SystemTime) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), value.into()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }
        if !self.max_age.is_zero() {
            let max_age = self.max_age.min(MAX_AGE_LIMIT);
            // MAX_AGE_LIMIT fits in i64 seconds
            builder = builder.max_age(CookieDuration::seconds(max_age.as_secs() as i64));
            if let Some(expires) = now
                .checked_add(max_age)
                .and_then(|at| at.duration_since(SystemTime::UNIX_EPOCH).ok())
                .and_then(|since| OffsetDateTime::UNIX_EPOCH.checked_add(since.try_into().ok()?))
            {
                builder = builder.expires(expires);
            }
        }

        builder.build()
    }

    /// Build a cookie that makes the client forget the session: empty value,
    /// negative `Max-Age` and an `Expires` in the past.
    pub fn deletion_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), String::new()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .max_age(CookieDuration::seconds(-1))
            .expires(OffsetDateTime::UNIX_EPOCH + CookieDuration::seconds(1));

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }

        builder.build()
    }

    /// Current session cookie value for this request.
    ///
    /// A cookie already queued in this request takes precedence over what the
    /// client sent, so a write followed by a read sees the new value. A queued
    /// deletion reads as "no session".
    pub fn value(&self, cookies: &CookieBuffer) -> Result<String> {
        if let Some(pending) = cookies.pending(&self.name) {
            let deleted = pending
                .max_age()
                .map(|age| age.is_negative())
                .unwrap_or(false);
            if deleted || pending.value().is_empty() {
                return Err(OverseerError::NoSession);
            }
            return Ok(pending.value().to_string());
        }

        match cookies.request_value(&self.name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(OverseerError::NoSession),
        }
    }
}
