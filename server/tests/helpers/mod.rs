//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full
//! axum router. Each test gets its own in-memory catalog and temp-dir
//! disk roots, so tests stay independent without serialization.
//!
//! Caller identity is injected per request as an extension, the same way
//! the embedding application's auth middleware would install it.
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

use mm_server::api::{create_router, AppState};
use mm_server::config::{Config, DiskDefinition};
use mm_server::db;
use mm_server::permissions::{Caller, Capability};
use mm_server::storage::DiskRegistry;

/// A fully wired application over an in-memory catalog and temp disks.
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub disks: Arc<DiskRegistry>,
    pub config: Arc<Config>,
    // Holds the disk roots alive for the duration of the test
    _tmp: tempfile::TempDir,
}

/// Build a fresh app with disks `media`, `attachments`, and `files`, a
/// 64 KB upload ceiling, and migrations applied.
pub async fn fresh_test_app() -> TestApp {
    let tmp = tempfile::tempdir().expect("temp dir");
    let config = Config {
        bind_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        disks: vec![
            DiskDefinition {
                name: "media".into(),
                root: tmp.path().join("media"),
            },
            DiskDefinition {
                name: "attachments".into(),
                root: tmp.path().join("attachments"),
            },
            DiskDefinition {
                name: "files".into(),
                root: tmp.path().join("files"),
            },
        ],
        max_upload_kb: 64,
        max_image_width: 4096,
        max_image_height: 4096,
        allowed_mime_types: None,
    };

    // A single connection keeps every query on the same in-memory DB
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("sqlite options")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .expect("connect test DB");
    db::run_migrations(&pool).await.expect("migrations");

    let disks = DiskRegistry::new(&config.disks);
    disks.init().await.expect("disk roots");

    let state = AppState::new(pool.clone(), config, disks);
    let router = create_router(state.clone());
    TestApp {
        router,
        pool,
        disks: state.disks,
        config: state.config,
        _tmp: tmp,
    }
}

impl TestApp {
    /// Start building a request.
    pub fn request(method: Method, path: &str) -> http::request::Builder {
        Request::builder().method(method).uri(path)
    }

    /// Send a request through the router.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router must produce a response")
    }

    /// Send a request on behalf of `caller`.
    pub async fn oneshot_as(&self, mut request: Request<Body>, caller: &Caller) -> Response<Body> {
        request.extensions_mut().insert(caller.clone());
        self.oneshot(request).await
    }
}

/// A caller with the given capability set and branch.
pub fn caller_with(capabilities: Capability, branch_id: Option<Uuid>) -> Caller {
    Caller {
        id: Uuid::now_v7(),
        branch_id,
        capabilities,
    }
}

/// One part of a hand-built multipart body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, file_name: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn text(name: &'a str, value: &str) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

pub const BOUNDARY: &str = "----TestBoundary";

/// Assemble a multipart/form-data body from parts.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Content-Type header value matching [`multipart_body`].
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// A small in-memory PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat};
    let img = DynamicImage::new_rgba8(width, height);
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    buf.into_inner()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body must be JSON")
}

/// Read a response body as raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}
