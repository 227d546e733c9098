//! Middleware that installs the per-request [`CookieBuffer`].
//!
//! Handlers reach the buffer through the `CookieBuffer` extractor. Whatever
//! cookies the session API queued while the handler ran are written to the
//! response headers exactly once, after the handler returns and before the
//! response is handed back to the server.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::CookieBuffer;
use crate::overseer::Overseer;

/// Install a cookie buffer for the request and flush it into the response.
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use session_overseer::session::session_middleware;
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "hi" }))
///     .layer(middleware::from_fn(session_middleware));
/// ```
pub async fn session_middleware(request: Request, next: Next) -> Response {
    let (buffer, request) = install(request);
    let response = next.run(request).await;
    flush(&buffer, response)
}

/// Like [`session_middleware`], but renews the session's expiry before the
/// handler runs.
///
/// Requests without a session pass through untouched. Any other renewal
/// failure is logged and the request still proceeds.
pub async fn session_reset_middleware(
    State(overseer): State<Arc<dyn Overseer>>,
    request: Request,
    next: Next,
) -> Response {
    let (buffer, request) = install(request);

    if let Err(e) = overseer.reset_expiry(&buffer).await {
        if e.is_no_session() {
            debug!("no session to renew");
        } else {
            warn!("failed to reset session expiry: {}", e);
        }
    }

    let response = next.run(request).await;
    flush(&buffer, response)
}

fn install(mut request: Request) -> (CookieBuffer, Request) {
    let buffer = CookieBuffer::from_headers(request.headers());
    request.extensions_mut().insert(buffer.clone());
    (buffer, request)
}

fn flush(buffer: &CookieBuffer, mut response: Response) -> Response {
    match buffer.flush_into(response.headers_mut()) {
        Ok(0) => response,
        Ok(n) => {
            debug!("flushed {} session cookie(s)", n);
            response
        }
        Err(e) => {
            error!("failed to write session cookies: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to write session cookie").into_response()
        }
    }
}
