//! API router configuration.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_flash, api_info, delete_session, delete_value, get_object, get_session_id, get_value,
    health, put_object, put_value, regenerate_session, take_flash, AppState,
};
use crate::error::OverseerError;
use crate::session::{session_middleware, session_reset_middleware};

/// Create the API router.
///
/// Session routes run behind the cookie-buffering middleware; when the state
/// asks for it, the middleware also renews the session on every request.
pub fn create_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/", get(get_session_id).delete(delete_session))
        .route("/regenerate", post(regenerate_session))
        .route(
            "/values/{key}",
            get(get_value).put(put_value).delete(delete_value),
        )
        .route("/object", get(get_object).put(put_object))
        .route("/flash/{key}", get(take_flash).post(add_flash));

    let session_routes = if state.reset_expiry {
        session_routes.layer(middleware::from_fn_with_state(
            state.overseer.clone(),
            session_reset_middleware,
        ))
    } else {
        session_routes.layer(middleware::from_fn(session_middleware))
    };

    let api_v1 = Router::new()
        .route("/", get(api_info))
        .nest("/session", session_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves, then stop the session sweeper.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state.clone());

    tracing::info!("Starting session-overseer API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(OverseerError::Server)?;

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(OverseerError::Server);

    state.shutdown().await;
    result
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
