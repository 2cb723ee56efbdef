#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use docket::config::{Config, NodeConfig, StorageConfig, DEFAULT_MAX_REQUEST_SIZE, DEFAULT_MAX_UPLOAD_SIZE};
use docket::object_store::{LocalStore, ObjectStore};
use docket::storage::models::{Division, Task};
use docket::storage::Database;
use docket::AppState;
use tower::ServiceExt;

const BOUNDARY: &str = "docket-test-boundary";

pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_test_mode(true)
    }

    pub fn with_test_mode(test_mode: bool) -> Self {
        Self::build(test_mode, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_MAX_REQUEST_SIZE)
    }

    pub fn with_limits(max_upload_size: u64, max_request_size: u64) -> Self {
        Self::build(true, max_upload_size, max_request_size)
    }

    fn build(test_mode: bool, max_upload_size: u64, max_request_size: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: dir.path().join("data").to_string_lossy().to_string(),
            },
            storage: StorageConfig {
                root: dir.path().join("storage").to_string_lossy().to_string(),
                mirror_root: dir.path().join("public").to_string_lossy().to_string(),
            },
            test_mode,
            max_upload_size,
            max_request_size,
        };

        let db = Database::open(&config.node.data_dir).unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(&config.storage.root).unwrap());
        let state = Arc::new(AppState::new(config, db, store));
        let router = docket::api::create_router(Arc::clone(&state));

        Self { dir, state, router }
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dir.path().join("storage")
    }

    pub fn mirror_root(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    /// Names of the blobs stored under `directory` in the primary root.
    pub fn blobs_in(&self, directory: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.storage_root().join(directory)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Insert a division and `count` tasks under it; returns the last task id.
    pub fn seed_tasks(&self, count: usize) -> u64 {
        let now = Utc::now();
        let division = self
            .state
            .db
            .insert(Division {
                id: 0,
                division_nom: "Finances".to_string(),
                division_responsable: "Responsable".to_string(),
                password_hash: "unused".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let mut last = 0;
        for n in 0..count {
            last = self
                .state
                .db
                .insert(Task {
                    id: 0,
                    title: format!("Task {}", n + 1),
                    description: None,
                    division_id: division.id,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap()
                .id;
        }
        last
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.send(request).await;
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Hand-assembled `multipart/form-data` body.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: Method, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
