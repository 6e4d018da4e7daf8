//! Test doubles and request helpers shared by unit and router tests.

mod memory;
mod storage;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::config::AppConfig;
use crate::database::Store;
use crate::models::{Account, NewAccount, Role};
use crate::state::AppState;

pub use memory::MemoryStore;
pub use storage::{FakeStorage, RecordedUpload};

pub const TEST_PASSWORD: &str = "secret123";

/// Development preset with a signing secret.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "test-jwt-secret".to_string();
    config
}

/// Detached account value, not persisted anywhere.
pub fn account(role: Role) -> Account {
    let id = Uuid::new_v4();
    Account {
        id,
        username: format!("{}-{}", role, id.simple()),
        email: format!("{}@example.com", id.simple()),
        password: TEST_PASSWORD.to_string(),
        role,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// The real router over in-memory collaborators.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), FakeStorage::new())
    }

    pub fn with(config: AppConfig, storage: FakeStorage) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(storage);
        let state = AppState::new(config, store.clone(), storage.clone());
        Self { state, store, storage }
    }

    pub fn router(&self) -> Router {
        crate::app::router(self.state.clone())
    }

    /// Persists an account and issues a bearer token for it.
    pub async fn user(&self, role: Role, username: &str) -> (Account, String) {
        let account = self
            .store
            .create_account(NewAccount::new(
                username,
                &format!("{}@example.com", username),
                TEST_PASSWORD,
                role,
            ))
            .await
            .unwrap();
        let token = self.token(&account);
        (account, token)
    }

    pub fn token(&self, account: &Account) -> String {
        let claims = Claims::for_account(account, 1);
        generate_jwt(&claims, &self.state.config.security).unwrap()
    }

    /// Sends one request through a fresh router and decodes the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Builds `multipart/form-data` request bodies.
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self {
            boundary: format!("test-boundary-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: Method, uri: &str, token: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
