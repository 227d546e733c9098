//! HTTP-facing session plumbing.
//!
//! This module provides session identifiers, cookie attributes, the
//! per-request cookie buffer and the middleware that flushes it.

mod buffer;
mod key;
mod middleware;
mod options;

pub use self::buffer::CookieBuffer;
pub use self::key::{new_session_id, valid_key, KEY_LEN};
pub use self::middleware::{session_middleware, session_reset_middleware};
pub use self::options::{CookieOptions, DEFAULT_COOKIE_NAME};
