//! API Router and Application State
//!
//! Central routing configuration and shared state.

pub mod attachments;
pub mod files;
pub mod media;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::storage::DiskRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Server configuration
    pub config: Arc<Config>,
    /// Configured named disks
    pub disks: Arc<DiskRegistry>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(db: SqlitePool, config: Config, disks: DiskRegistry) -> Self {
        Self {
            db,
            config: Arc::new(config),
            disks: Arc::new(disks),
        }
    }
}

/// Create the main application router.
///
/// Caller identity is expected as a request extension installed by the
/// embedding application's auth middleware; requests without one are
/// rejected by the [`crate::permissions::Caller`] extractor.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Leave headroom for multipart framing on top of the file itself
    let max_body = usize::try_from(state.config.max_upload_kb * 1024)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Managed media library
        .route(
            "/api/media",
            get(media::list_media).post(media::upload_media),
        )
        .route(
            "/api/media/{id}",
            get(media::get_media)
                .patch(media::rename_media)
                .delete(media::delete_media),
        )
        .route("/api/media/{id}/download", get(media::download_media))
        // Direct disk files
        .route("/api/files", get(files::list_files).post(files::upload_file))
        .route("/api/files/{disk}/{*path}", get(files::download_file))
        // Attachment batches
        .route(
            "/api/attachments/{parent_kind}/{parent_id}",
            get(attachments::list_batch).post(attachments::create_batch),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body))
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Number of configured disks
    disks: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        disks: state.config.disks.len(),
    })
}
