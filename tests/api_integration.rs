//! API integration tests.
//!
//! These tests drive the full router end-to-end with axum's test utilities,
//! carrying the session cookie between requests the way a browser would.
//! Redis is not exercised here because it needs a live server.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use cookie::Cookie;
use serde_json::{json, Value};
use session_overseer::api::{create_router, AppState};
use session_overseer::config::Backend;
use session_overseer::{
    make_secret_key, CookieOptions, CookieOverseer, DiskStorer, MemoryStorer, StorageOverseer,
};
use tempfile::TempDir;
use tower::ServiceExt;

/// Router plus a one-cookie jar.
struct Client {
    app: Router,
    cookie: Option<(String, String)>,
}

impl Client {
    fn new(state: AppState) -> Self {
        Self {
            app: create_router(state),
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some((ref name, ref value)) = self.cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", name, value));
        }

        let request = match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();

        for raw in response.headers().get_all(header::SET_COOKIE) {
            let parsed = Cookie::parse(raw.to_str().unwrap().to_string()).unwrap();
            if parsed.value().is_empty() {
                self.cookie = None;
            } else {
                self.cookie = Some((parsed.name().to_string(), parsed.value().to_string()));
            }
        }

        response
    }

    fn cookie_value(&self) -> String {
        self.cookie.as_ref().map(|(_, v)| v.clone()).unwrap_or_default()
    }
}

fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|raw| Cookie::parse(raw.to_str().unwrap().to_string()).unwrap())
        .collect()
}

async fn response_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

async fn response_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

fn memory_state(options: CookieOptions) -> (AppState, Arc<MemoryStorer>) {
    let storer = Arc::new(MemoryStorer::with_defaults());
    let overseer = StorageOverseer::new(options, storer.clone()).unwrap();
    (AppState::new(Arc::new(overseer), Backend::Memory), storer)
}

fn cookie_state() -> AppState {
    let overseer = CookieOverseer::new(CookieOptions::new(), &make_secret_key()).unwrap();
    AppState::new(Arc::new(overseer), Backend::Cookie)
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    let response = client.send(Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

#[tokio::test]
async fn test_api_info_endpoint() {
    let mut client = Client::new(cookie_state());

    let response = client.send(Method::GET, "/api/v1", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["name"], "session-overseer");
    assert_eq!(json["backend"], "cookie");
}

// ============================================================================
// Server-Side Storage Tests
// ============================================================================

#[tokio::test]
async fn test_value_round_trip() {
    let (state, storer) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    let response = client
        .send(Method::PUT, "/api/v1/session/values/hi", Some(json!({"value": "hello"})))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(set_cookies(&response).len(), 1);
    let first_id = client.cookie_value();
    assert_eq!(first_id.len(), 36);

    let response = client.send(Method::GET, "/api/v1/session/values/hi", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["key"], "hi");
    assert_eq!(json["value"], "hello");

    let response = client
        .send(Method::PUT, "/api/v1/session/values/hi", Some(json!({"value": "spiders"})))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(client.cookie_value(), first_id);

    let response = client.send(Method::GET, "/api/v1/session/values/hi", None).await;
    assert_eq!(response_json(response).await["value"], "spiders");
    assert_eq!(storer.count(), 1);
}

#[tokio::test]
async fn test_get_without_session() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    let response = client.send(Method::GET, "/api/v1/session/values/hi", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(response_json(response).await["code"], "NO_SESSION");
}

#[tokio::test]
async fn test_missing_key() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;

    let response = client.send(Method::GET, "/api/v1/session/values/b", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "KEY_NOT_FOUND");
}

#[tokio::test]
async fn test_delete_value() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;
    let response = client.send(Method::DELETE, "/api/v1/session/values/a", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.send(Method::GET, "/api/v1/session/values/a", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_object_round_trip() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);
    let profile = json!({"name": "alice", "roles": ["admin"], "visits": 3});

    let response = client
        .send(Method::PUT, "/api/v1/session/object", Some(profile.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.send(Method::GET, "/api/v1/session/object", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, profile);
}

#[tokio::test]
async fn test_flash_read_once() {
    let (state, _) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    let response = client
        .send(Method::POST, "/api/v1/session/flash/notice", Some(json!("saved")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client.send(Method::GET, "/api/v1/session/flash/notice", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!("saved"));

    let response = client.send(Method::GET, "/api/v1/session/flash/notice", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "KEY_NOT_FOUND");
}

#[tokio::test]
async fn test_session_id_and_regenerate() {
    let (state, storer) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    client
        .send(Method::PUT, "/api/v1/session/values/user", Some(json!({"value": "alice"})))
        .await;

    let response = client.send(Method::GET, "/api/v1/session", None).await;
    let old_id = response_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(old_id, client.cookie_value());

    let response = client.send(Method::POST, "/api/v1/session/regenerate", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let new_id = response_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(new_id, old_id);
    assert_eq!(client.cookie_value(), new_id);
    assert_eq!(storer.count(), 1);

    let response = client.send(Method::GET, "/api/v1/session/values/user", None).await;
    assert_eq!(response_json(response).await["value"], "alice");

    let mut stale = Client {
        app: client.app.clone(),
        cookie: Some(("id".to_string(), old_id)),
    };
    let response = stale.send(Method::GET, "/api/v1/session/values/user", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_session() {
    let (state, storer) = memory_state(CookieOptions::new());
    let mut client = Client::new(state);

    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;

    let response = client.send(Method::DELETE, "/api/v1/session", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value(), "");
    assert!(client.cookie.is_none());
    assert_eq!(storer.count(), 0);

    let response = client.send(Method::DELETE, "/api/v1/session", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_reset_expiry_refreshes_cookie() {
    let options = CookieOptions::new().with_max_age(Duration::from_secs(60));
    let (state, _) = memory_state(options);
    let mut client = Client::new(state.with_reset_expiry(true));

    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;
    let id = client.cookie_value();

    let response = client.send(Method::GET, "/api/v1/session", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value(), id);
    assert_eq!(
        cookies[0].max_age(),
        Some(cookie::time::Duration::seconds(60))
    );
}

#[tokio::test]
async fn test_reset_expiry_without_session_passes_through() {
    let (state, _) = memory_state(CookieOptions::new().with_max_age(Duration::from_secs(60)));
    let mut client = Client::new(state.with_reset_expiry(true));

    let response = client.send(Method::GET, "/api/v1/session/values/a", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_disk_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    let storer = Arc::new(DiskStorer::with_defaults(dir.path()).unwrap());
    let overseer = StorageOverseer::new(CookieOptions::new(), storer).unwrap();
    let mut client = Client::new(AppState::new(Arc::new(overseer), Backend::Disk));

    client
        .send(Method::PUT, "/api/v1/session/values/k", Some(json!({"value": "on disk"})))
        .await;
    assert!(dir.path().join(client.cookie_value()).exists());

    let response = client.send(Method::GET, "/api/v1/session/values/k", None).await;
    assert_eq!(response_json(response).await["value"], "on disk");
}

// ============================================================================
// Encrypted Cookie Tests
// ============================================================================

#[tokio::test]
async fn test_cookie_backend_round_trip() {
    let mut client = Client::new(cookie_state());

    client
        .send(Method::PUT, "/api/v1/session/values/hi", Some(json!({"value": "hello"})))
        .await;
    let sealed = client.cookie_value();
    assert!(!sealed.contains("hello"));

    let response = client.send(Method::GET, "/api/v1/session/values/hi", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["value"], "hello");
}

#[tokio::test]
async fn test_cookie_backend_flash() {
    let mut client = Client::new(cookie_state());

    client
        .send(Method::POST, "/api/v1/session/flash/n", Some(json!({"level": "info"})))
        .await;

    let response = client.send(Method::GET, "/api/v1/session/flash/n", None).await;
    assert_eq!(response_json(response).await, json!({"level": "info"}));

    let response = client.send(Method::GET, "/api/v1/session/flash/n", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cookie_backend_unsupported_operations() {
    let mut client = Client::new(cookie_state());
    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;

    let response = client.send(Method::POST, "/api/v1/session/regenerate", None).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let response = client.send(Method::GET, "/api/v1/session", None).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(response_json(response).await["code"], "UNSUPPORTED");
}

#[tokio::test]
async fn test_cookie_backend_rejects_tampering() {
    let mut client = Client::new(cookie_state());
    client
        .send(Method::PUT, "/api/v1/session/values/a", Some(json!({"value": "1"})))
        .await;

    let mut sealed = client.cookie_value().into_bytes();
    let mid = sealed.len() / 2;
    sealed[mid] = if sealed[mid] == b'A' { b'B' } else { b'A' };
    client.cookie = Some(("id".to_string(), String::from_utf8(sealed).unwrap()));

    let response = client.send(Method::GET, "/api/v1/session/values/a", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["code"], "INVALID_SESSION");
}
