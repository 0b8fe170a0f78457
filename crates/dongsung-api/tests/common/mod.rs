#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use dongsung_api::middleware::SessionKeys;
use dongsung_api::uploads::UploadStore;
use dongsung_api::{AppState, AppStateInner, Policy, router};
use dongsung_crypto::Hasher;
use dongsung_db::Database;

const BOUNDARY: &str = "dongsung-test-boundary";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    uploads_dir: PathBuf,
}

pub async fn app() -> TestApp {
    app_with(Policy::default()).await
}

/// Real router over an in-memory database, a throwaway uploads directory and
/// a deliberately cheap Argon2 cost.
pub async fn app_with(policy: Policy) -> TestApp {
    let uploads_dir = std::env::temp_dir().join(format!("dongsung-test-{}", Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Database::in_memory().unwrap(),
        hasher: Hasher::new(64, 1).unwrap(),
        sessions: SessionKeys::new("test-secret", chrono::Duration::hours(1)),
        uploads: UploadStore::new(&uploads_dir).await.unwrap(),
        policy,
    });

    TestApp {
        router: router(state.clone()),
        state,
        uploads_dir,
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads_dir);
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let req = authorized(Request::builder().method(Method::GET).uri(uri), token)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let req = authorized(Request::builder().method(method).uri(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn multipart(&self, uri: &str, form: Form, token: Option<&str>) -> (StatusCode, Value) {
        self.multipart_body(uri, form.finish(), token).await
    }

    /// Post an already encoded multipart body, complete or not.
    pub async fn multipart_body(&self, uri: &str, body: Vec<u8>, token: Option<&str>) -> (StatusCode, Value) {
        let req = authorized(Request::builder().method(Method::POST).uri(uri), token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Register `username` and return a session token for it.
    pub async fn member(&self, username: &str, password: &str) -> (i64, String) {
        let creds = json!({ "username": username, "password": password });
        let (status, _) = self.json(Method::POST, "/api/register", creds.clone(), None).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self.json(Method::POST, "/api/login", creds, None).await;
        assert_eq!(status, StatusCode::OK);
        (
            body["userId"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Bytes stored behind an `/uploads/...` URL.
    pub fn uploaded(&self, url: &str) -> Vec<u8> {
        let name = url.strip_prefix("/uploads/").unwrap();
        std::fs::read(self.state.uploads.dir().join(name)).unwrap()
    }

    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(self.state.uploads.dir()).unwrap().count()
    }
}

fn authorized(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

/// Minimal multipart/form-data encoder.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Body that breaks off inside a text part named `name`, with no closing
    /// boundary.
    pub fn cut_off_in(mut self, name: &str) -> Vec<u8> {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\nPsal",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        self.body
    }

    fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}
