//! Shared test host for HTTP integration tests.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`
//! over an in-memory depot whose blob store stays reachable for seeding.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use depot::Depot;
use depot::model::{Artifact, NewDirectory};
use depot::service::DirectoryDefaults;
use depot::store::{BlobStore, MemoryBlobs, MetadataStore};

/// Upload limit used by test routers.
pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024;

pub const BOUNDARY: &str = "depot-test-boundary";

/// A response with its body collected.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Response is not JSON")
    }
}

pub struct TestHost {
    pub depot: Depot,
    pub blobs: Arc<MemoryBlobs>,
    router: Router,
}

impl TestHost {
    pub fn new() -> Self {
        let blobs = Arc::new(MemoryBlobs::new());
        let depot = Depot::new(
            MetadataStore::memory(),
            blobs.clone(),
            DirectoryDefaults::default(),
        );
        let router = depot::http::router(depot.clone(), MAX_UPLOAD_BYTES);
        Self {
            depot,
            blobs,
            router,
        }
    }

    pub fn directory(&self, new: NewDirectory) {
        self.depot
            .create_directory(new)
            .expect("Failed to create directory");
    }

    /// Stores an artifact at an arbitrary path below `directory`.
    pub fn seed(&self, directory: &str, path: &str, data: &[u8]) {
        self.blobs.write(path, data).expect("Failed to write blob");
        let created = self
            .depot
            .store()
            .create_artifact(&Artifact {
                path: path.to_string(),
                directory: directory.to_string(),
                is_permanent: true,
                created_at: Utc::now(),
            })
            .expect("Failed to create artifact");
        assert!(created, "artifact {path} already exists");
    }

    /// Adds a user and returns a fresh lookup token for it.
    pub fn token_for(&self, user: &str, groups: &[&str]) -> String {
        let groups: Vec<String> = groups.iter().map(|g| (*g).to_string()).collect();
        self.depot.add_user(user, &groups).expect("Failed to add user");
        self.depot
            .create_token(user, "test", Utc::now())
            .expect("Failed to create token")
            .secret
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(&self, method: Method, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("Invalid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri).await
    }

    /// Multipart upload of one file into the directory at `uri`.
    pub async fn upload(&self, uri: &str, filename: &str, data: &[u8]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(filename, data, &[])))
            .expect("Invalid request");
        self.send(request).await
    }

    /// Urlencoded form request.
    pub async fn form(&self, method: Method, uri: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("Invalid request");
        self.send(request).await
    }
}

/// Builds a multipart body with the file in the `path` field plus extra
/// text fields.
pub fn multipart_body(filename: &str, data: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"path\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
