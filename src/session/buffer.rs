//! Per-request cookie buffer.
//!
//! Session operations never write `Set-Cookie` headers directly. They record
//! the cookie they want in a [`CookieBuffer`], keyed by cookie name, and the
//! session middleware flushes the buffer once the handler has produced its
//! response. Multiple writes to the same name collapse to the last one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode};
use cookie::Cookie;

use crate::error::OverseerError;
use crate::Result;

#[derive(Debug, Default)]
struct Inner {
    /// Cookies sent by the client, first occurrence of each name wins.
    incoming: HashMap<String, String>,
    /// Cookies to emit with the response, last write per name wins.
    pending: BTreeMap<String, Cookie<'static>>,
}

/// Inbound cookies plus the outbound cookies a handler has queued.
///
/// Cloning is cheap and every clone shares the same buffer, so the middleware
/// can keep a handle while the handler mutates another.
#[derive(Debug, Clone, Default)]
pub struct CookieBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl CookieBuffer {
    /// Create an empty buffer with no inbound cookies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer seeded from the request's `Cookie` headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for parsed in Cookie::split_parse(raw).flatten() {
                incoming
                    .entry(parsed.name().to_string())
                    .or_insert_with(|| parsed.value().to_string());
            }
        }

        Self {
            inner: Arc::new(Mutex::new(Inner {
                incoming,
                pending: BTreeMap::new(),
            })),
        }
    }

    /// Add an inbound cookie, as if the client had sent it.
    pub fn with_request_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.incoming.insert(name.into(), value.into());
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| OverseerError::LockPoisoned)
    }

    /// Value of the cookie the client sent under `name`.
    pub fn request_value(&self, name: &str) -> Option<String> {
        self.lock().ok()?.incoming.get(name).cloned()
    }

    /// Cookie queued for the response under `name`, if any.
    pub fn pending(&self, name: &str) -> Option<Cookie<'static>> {
        self.lock().ok()?.pending.get(name).cloned()
    }

    /// Queue `cookie` for the response, replacing any earlier cookie with the
    /// same name.
    pub fn set(&self, cookie: Cookie<'static>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.pending.insert(cookie.name().to_string(), cookie);
        Ok(())
    }

    /// Number of distinct cookies waiting to be written.
    pub fn pending_len(&self) -> usize {
        self.lock().map(|inner| inner.pending.len()).unwrap_or(0)
    }

    /// Remove and return every queued cookie.
    pub fn take_pending(&self) -> Result<Vec<Cookie<'static>>> {
        let mut inner = self.lock()?;
        Ok(std::mem::take(&mut inner.pending).into_values().collect())
    }

    /// Write every queued cookie as a `Set-Cookie` header and clear the queue.
    ///
    /// Returns the number of headers written.
    pub fn flush_into(&self, headers: &mut HeaderMap) -> Result<usize> {
        let cookies = self.take_pending()?;
        let count = cookies.len();

        for cookie in cookies {
            let value = HeaderValue::from_str(&cookie.to_string())
                .map_err(|e| OverseerError::Header(e.to_string()))?;
            headers.append(header::SET_COOKIE, value);
        }

        Ok(count)
    }
}

impl<S> FromRequestParts<S> for CookieBuffer
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<CookieBuffer>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session middleware is not installed",
        ))
    }
}
