//! REST API handlers.
//!
//! Every handler works on the request's [`CookieBuffer`], so the router must
//! install one of the session middlewares.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use super::types::{ErrorResponse, PutValueRequest, SessionIdResponse, ValueResponse};
use crate::config::Backend;
use crate::error::OverseerError;
use crate::json;
use crate::overseer::Overseer;
use crate::session::CookieBuffer;
use crate::storer::Cleaner;

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn api_error(err: OverseerError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, body) = ErrorResponse::from_error(&err);
    if status.is_server_error() {
        tracing::error!("session operation failed: {}", err);
    } else {
        debug!("session request rejected: {}", err);
    }
    (status, Json(body))
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub overseer: Arc<dyn Overseer>,
    /// Sweeper owner for the memory and disk backends.
    pub cleaner: Option<Arc<dyn Cleaner>>,
    pub backend: Backend,
    /// Renew the session on every request.
    pub reset_expiry: bool,
}

impl AppState {
    pub fn new(overseer: Arc<dyn Overseer>, backend: Backend) -> Self {
        Self {
            overseer,
            cleaner: None,
            backend,
            reset_expiry: false,
        }
    }

    pub fn with_cleaner(mut self, cleaner: Option<Arc<dyn Cleaner>>) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_reset_expiry(mut self, reset_expiry: bool) -> Self {
        self.reset_expiry = reset_expiry;
        self
    }

    /// Stop the background sweeper, if any, and wait for it to exit.
    pub async fn shutdown(&self) {
        if let Some(ref cleaner) = self.cleaner {
            cleaner.stop_cleaner().await;
            info!("session sweeper stopped");
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend)
            .field(
                "cleaning",
                &self.cleaner.as_ref().is_some_and(|c| c.is_cleaning()),
            )
            .field("reset_expiry", &self.reset_expiry)
            .finish_non_exhaustive()
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "name": "session-overseer",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "backend": state.backend.as_str(),
    }))
}

/// Current session identifier.
pub async fn get_session_id(
    State(state): State<AppState>,
    cookies: CookieBuffer,
) -> ApiResult<Json<SessionIdResponse>> {
    let session_id = state.overseer.session_id(&cookies).await.map_err(api_error)?;
    Ok(Json(SessionIdResponse { session_id }))
}

/// Destroy the session.
pub async fn delete_session(
    State(state): State<AppState>,
    cookies: CookieBuffer,
) -> ApiResult<StatusCode> {
    state.overseer.del(&cookies).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move the session to a new identifier.
pub async fn regenerate_session(
    State(state): State<AppState>,
    cookies: CookieBuffer,
) -> ApiResult<Json<SessionIdResponse>> {
    state.overseer.regenerate(&cookies).await.map_err(api_error)?;
    let session_id = state.overseer.session_id(&cookies).await.map_err(api_error)?;
    Ok(Json(SessionIdResponse { session_id }))
}

/// Read one string value.
pub async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    cookies: CookieBuffer,
) -> ApiResult<Json<ValueResponse>> {
    let value = json::get(state.overseer.as_ref(), &cookies, &key)
        .await
        .map_err(api_error)?;
    Ok(Json(ValueResponse { key, value }))
}

/// Write one string value.
pub async fn put_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    cookies: CookieBuffer,
    Json(req): Json<PutValueRequest>,
) -> ApiResult<StatusCode> {
    json::set(state.overseer.as_ref(), &cookies, &key, &req.value)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove one string value.
pub async fn delete_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    cookies: CookieBuffer,
) -> ApiResult<StatusCode> {
    json::del(state.overseer.as_ref(), &cookies, &key)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Read the whole stored object.
pub async fn get_object(
    State(state): State<AppState>,
    cookies: CookieBuffer,
) -> ApiResult<Json<Value>> {
    let value: Value = json::get_obj(state.overseer.as_ref(), &cookies)
        .await
        .map_err(api_error)?;
    Ok(Json(value))
}

/// Replace the whole stored object.
pub async fn put_object(
    State(state): State<AppState>,
    cookies: CookieBuffer,
    Json(value): Json<Value>,
) -> ApiResult<StatusCode> {
    json::set_obj(state.overseer.as_ref(), &cookies, &value)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queue a flash message.
pub async fn add_flash(
    State(state): State<AppState>,
    Path(key): Path<String>,
    cookies: CookieBuffer,
    Json(value): Json<Value>,
) -> ApiResult<StatusCode> {
    json::add_flash_obj(state.overseer.as_ref(), &cookies, &key, &value)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::CREATED)
}

/// Read and consume a flash message.
pub async fn take_flash(
    State(state): State<AppState>,
    Path(key): Path<String>,
    cookies: CookieBuffer,
) -> ApiResult<Json<Value>> {
    let value: Value = json::get_flash_obj(state.overseer.as_ref(), &cookies, &key)
        .await
        .map_err(api_error)?;
    Ok(Json(value))
}
