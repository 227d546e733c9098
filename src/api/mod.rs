//! Demo HTTP API over the session layer.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//!
//! ### Session
//! - `GET /api/v1/session` - Current session identifier
//! - `DELETE /api/v1/session` - Destroy the session
//! - `POST /api/v1/session/regenerate` - Rotate the session identifier
//!
//! ### Values
//! - `GET /api/v1/session/values/{key}` - Read a string value
//! - `PUT /api/v1/session/values/{key}` - Write a string value (`{"value": "..."}`)
//! - `DELETE /api/v1/session/values/{key}` - Remove a string value
//! - `GET /api/v1/session/object` - Read the stored JSON object
//! - `PUT /api/v1/session/object` - Replace the stored JSON object
//!
//! ### Flash
//! - `POST /api/v1/session/flash/{key}` - Queue a flash message (any JSON)
//! - `GET /api/v1/session/flash/{key}` - Read and consume a flash message
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_overseer::api::{serve, shutdown_signal, AppState};
//! use session_overseer::config::Backend;
//! use session_overseer::overseer::StorageOverseer;
//! use session_overseer::session::CookieOptions;
//! use session_overseer::storer::MemoryStorer;
//!
//! #[tokio::main]
//! async fn main() -> session_overseer::Result<()> {
//!     let storer = Arc::new(MemoryStorer::with_defaults());
//!     let overseer = StorageOverseer::new(CookieOptions::new(), storer)?;
//!     let state = AppState::new(Arc::new(overseer), Backend::Memory);
//!     serve("127.0.0.1:3000".parse().unwrap(), state, shutdown_signal()).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::AppState;
pub use router::{create_router, serve, shutdown_signal};
pub use types::{ErrorResponse, PutValueRequest, SessionIdResponse, ValueResponse};
