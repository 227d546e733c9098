//! # session-overseer
//!
//! Pluggable HTTP session management for axum.
//!
//! Session state is either kept entirely in an AES-GCM encrypted cookie, or
//! in a server-side store keyed by a random session identifier. Both are
//! driven through the same [`Overseer`] interface, and a JSON layer on top
//! adds keyed values, whole-object storage and one-shot flash messages.
//!
//! ## Features
//!
//! - **Encrypted cookies**: [`CookieOverseer`] seals the session with AES-128/256-GCM
//! - **Server-side storage**: [`StorageOverseer`] over memory, disk or Redis [`Storer`]s
//! - **Expiry sweeping**: background sweepers with synchronous shutdown
//! - **Buffered cookies**: at most one `Set-Cookie` per cookie name per response
//! - **Flash messages**: values that disappear after one successful read
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use session_overseer::{json, CookieBuffer, CookieOptions, MemoryStorer, Overseer, StorageOverseer};
//!
//! #[tokio::main]
//! async fn main() -> session_overseer::Result<()> {
//!     session_overseer::logging::try_init().ok();
//!
//!     let storer = Arc::new(MemoryStorer::with_defaults());
//!     let overseer: Arc<dyn Overseer> =
//!         Arc::new(StorageOverseer::new(CookieOptions::new(), storer)?);
//!
//!     let app: Router = Router::new()
//!         .route(
//!             "/",
//!             get(move |cookies: CookieBuffer| {
//!                 let overseer = overseer.clone();
//!                 async move {
//!                     let visits = json::get(overseer.as_ref(), &cookies, "visits")
//!                         .await
//!                         .ok()
//!                         .and_then(|v| v.parse::<u64>().ok())
//!                         .unwrap_or(0)
//!                         + 1;
//!                     let _ = json::set(overseer.as_ref(), &cookies, "visits", &visits.to_string()).await;
//!                     format!("visit #{}", visits)
//!                 }
//!             }),
//!         )
//!         .layer(middleware::from_fn(session_overseer::session_middleware));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cipher;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod json;
pub mod logging;
pub mod overseer;
pub mod session;
pub mod storer;

// Re-export commonly used types
pub use cipher::{make_secret_key, Cipher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{is_no_map_key, is_no_session, OverseerError, Result};
pub use overseer::{CookieOverseer, Overseer, StorageOverseer};
pub use session::{
    new_session_id, session_middleware, session_reset_middleware, valid_key, CookieBuffer,
    CookieOptions,
};
pub use storer::{Cleaner, DiskStorer, ExpiryPolicy, MemoryStorer, RedisStorer, Storer};
