//! Direct disk file handlers.
//!
//! These operate on bare `(disk, path)` references with no catalog
//! involvement. Every path crosses the safety guard before touching the
//! filesystem, and unknown disk names read as not found.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use mm_common::{AcceptMode, FileInfo};
use serde::Deserialize;

use crate::error::MediaError;
use crate::media::{validate_upload, UploadRequest, UploadRules};
use crate::permissions::{Caller, Capability};
use crate::storage::{self, path_guard};

use super::media::file_response;
use super::AppState;

/// File listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FilesQuery {
    /// Named disk to list.
    pub disk: String,
    /// Directory under the disk root (default: the root itself).
    #[serde(default)]
    pub directory: String,
}

/// GET /api/files
/// Lists files under a directory on a named disk.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(FilesQuery),
    responses(
        (status = 200, description = "Files in the directory", body = [FileInfo]),
        (status = 403, description = "Caller may not view files"),
        (status = 404, description = "Unknown disk or unsafe directory"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn list_files(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<FileInfo>>, MediaError> {
    caller.require(Capability::VIEW_MEDIA)?;
    path_guard::ensure_safe(&query.directory)?;
    let disk = state.disks.get(&query.disk)?;

    let mut infos = Vec::new();
    for path in disk.list(&query.directory).await? {
        infos.push(disk.file_info(&path).await?);
    }
    Ok(Json(infos))
}

/// POST /api/files
/// Uploads a file to a directory on a named disk.
///
/// Multipart fields: `file` (required), `disk` (required), `directory`
/// (optional, default disk root).
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    responses(
        (status = 201, description = "Stored file", body = FileInfo),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Caller may not upload"),
        (status = 404, description = "Unknown disk or unsafe directory"),
    ),
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %caller.id))]
pub async fn upload_file(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileInfo>), MediaError> {
    caller.require(Capability::UPLOAD_MEDIA)?;

    let mut upload: Option<UploadRequest> = None;
    let mut disk_name: Option<String> = None;
    let mut directory = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MediaError::Validation(format!("Invalid multipart data: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let declared_mime = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| MediaError::Validation(format!("Failed to read file: {e}")))?;
                upload = Some(UploadRequest {
                    file_name,
                    declared_mime,
                    data: data.to_vec(),
                });
            }
            Some("disk") => {
                disk_name = field.text().await.ok().filter(|d| !d.trim().is_empty());
            }
            Some("directory") => {
                directory = field.text().await.unwrap_or_default().trim().to_string();
            }
            _ => {}
        }
    }

    let upload = upload.ok_or(MediaError::NoFile)?;
    let disk_name =
        disk_name.ok_or_else(|| MediaError::Validation("Missing disk field".to_string()))?;

    let validated = validate_upload(
        upload,
        &UploadRules {
            accept_mode: AcceptMode::Mixed,
            max_kb: state.config.max_upload_kb,
            constraints: mm_common::DimensionConstraints::default(),
            allowed_mimes: state.config.allowed_mime_types.clone(),
        },
    )?;
    let (_, info) = storage::store_direct(&state.disks, &disk_name, &directory, &validated).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /api/files/{disk}/{path}
/// Streams a file from a named disk.
#[utoipa::path(
    get,
    path = "/api/files/{disk}/{path}",
    tag = "files",
    responses(
        (status = 200, description = "File content"),
        (status = 403, description = "Caller may not view files"),
        (status = 404, description = "Missing file, unknown disk, or unsafe path"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn download_file(
    State(state): State<AppState>,
    caller: Caller,
    Path((disk_name, path)): Path<(String, String)>,
) -> Result<Response, MediaError> {
    caller.require(Capability::VIEW_MEDIA)?;
    let disk = state.disks.get(&disk_name)?;
    // One read serves the response; no metadata probe needed here
    let body = disk.read(&path).await?;
    let name = path.rsplit('/').next().unwrap_or(&path);
    let mime_type = mime_guess::from_path(&path)
        .first()
        .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string());
    Ok(file_response(&mime_type, name, body))
}
