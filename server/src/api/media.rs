//! Managed media library handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mm_common::{AcceptMode, MediaSort, MediaSummary, TypeFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::queries::{self, MediaQuery};
use crate::error::MediaError;
use crate::media::{validate_upload, UploadRequest, UploadRules};
use crate::permissions::{AccessPolicy, Caller, Capability};
use crate::picker::PAGE_SIZE;
use crate::storage;

use super::AppState;

/// Disk managed library uploads land on.
const MEDIA_DISK: &str = "media";

const MAX_PER_PAGE: i64 = 100;

/// Listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    /// Case-insensitive substring over name and original filename.
    pub search: Option<String>,
    /// Sort order (default newest first).
    #[serde(default)]
    pub sort: MediaSort,
    /// Requested type filter; honored only in mixed accept mode.
    #[serde(default)]
    pub filter: TypeFilter,
    /// Accept mode the listing serves (default mixed).
    #[serde(default)]
    pub accept: AcceptMode,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, clamped to 1..=100.
    pub per_page: Option<i64>,
}

/// Listing response page.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ListResponse {
    /// Items on this page.
    pub items: Vec<MediaSummary>,
    /// Whether more pages exist past this one.
    pub has_more: bool,
}

/// GET /api/media
/// Lists media visible to the caller, with search, sort, and paging.
#[utoipa::path(
    get,
    path = "/api/media",
    tag = "media",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of media items", body = ListResponse),
        (status = 403, description = "Caller may not view media"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn list_media(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, MediaError> {
    let scope = AccessPolicy::resolve(&caller, query.accept, query.filter)?;
    let limit = query.per_page.unwrap_or(PAGE_SIZE).clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);

    // One extra row decides has_more without a count query
    let rows = queries::list_media(
        &state.db,
        &MediaQuery {
            scope,
            search: query.search,
            sort: query.sort,
            limit: limit + 1,
            offset: (page - 1) * limit,
        },
    )
    .await?;

    let has_more = rows.len() as i64 > limit;
    let items = rows
        .into_iter()
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|record| storage::summarize(&state.disks, record))
        .collect();
    Ok(Json(ListResponse { items, has_more }))
}

/// POST /api/media
/// Uploads a file into the managed library.
///
/// Multipart fields: `file` (required), `name` (optional display name),
/// `accept` (optional comma-separated legacy accept types).
#[utoipa::path(
    post,
    path = "/api/media",
    tag = "media",
    responses(
        (status = 201, description = "Created media record", body = MediaSummary),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Caller may not upload"),
        (status = 413, description = "File too large"),
        (status = 415, description = "File type not accepted"),
    ),
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %caller.id))]
pub async fn upload_media(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaSummary>), MediaError> {
    caller.require(Capability::UPLOAD_MEDIA)?;

    let mut upload: Option<UploadRequest> = None;
    let mut display_name: Option<String> = None;
    let mut accept_mode = AcceptMode::Mixed;

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
            Some("name") => {
                display_name = field.text().await.ok().filter(|n| !n.trim().is_empty());
            }
            Some("accept") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| MediaError::Validation(format!("Invalid accept field: {e}")))?;
                let kinds: Vec<&str> = raw.split(',').filter(|k| !k.trim().is_empty()).collect();
                accept_mode = AcceptMode::from_legacy(&kinds)
                    .map_err(|e| MediaError::Validation(e.to_string()))?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or(MediaError::NoFile)?;
    let validated = validate_upload(upload, &upload_rules(&state, accept_mode))?;
    let record =
        storage::store_managed(&state.db, &state.disks, &caller, MEDIA_DISK, display_name, validated)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(storage::summarize(&state.disks, record)),
    ))
}

/// GET /api/media/{id}
/// Fetches one media record under the caller's visibility scope.
#[utoipa::path(
    get,
    path = "/api/media/{id}",
    tag = "media",
    responses(
        (status = 200, description = "Media record", body = MediaSummary),
        (status = 404, description = "Not found or not visible"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn get_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaSummary>, MediaError> {
    let scope = AccessPolicy::resolve(&caller, AcceptMode::Mixed, TypeFilter::All)?;
    let record = queries::find_media_scoped(&state.db, id, &scope)
        .await?
        .ok_or(MediaError::NotFound)?;
    Ok(Json(storage::summarize(&state.disks, record)))
}

/// Download query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DownloadQuery {
    /// `thumbnail` serves the thumbnail rendition when one exists.
    pub variant: Option<String>,
}

/// GET /api/media/{id}/download
/// Streams the stored file (or its thumbnail rendition).
#[utoipa::path(
    get,
    path = "/api/media/{id}/download",
    tag = "media",
    params(DownloadQuery),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "Not found or not visible"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn download_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, MediaError> {
    let scope = AccessPolicy::resolve(&caller, AcceptMode::Mixed, TypeFilter::All)?;
    let record = queries::find_media_scoped(&state.db, id, &scope)
        .await?
        .ok_or(MediaError::NotFound)?;

    // A thumbnail request falls back to the original when none exists
    let want_thumbnail = query.variant.as_deref() == Some("thumbnail");
    let (path, content_type, file_name) = match (&record.thumbnail_path, want_thumbnail) {
        (Some(thumb), true) => {
            let stem = std::path::Path::new(&record.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("thumbnail");
            (
                thumb.clone(),
                "image/webp".to_string(),
                format!("{stem}_thumb.webp"),
            )
        }
        _ => (
            record.path.clone(),
            record.mime_type.clone(),
            record.file_name.clone(),
        ),
    };

    let disk = state.disks.get(&record.disk)?;
    let body = disk.read(&path).await?;
    Ok(file_response(&content_type, &file_name, body))
}

/// Rename request body.
#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RenameRequest {
    /// New display name.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// PATCH /api/media/{id}
/// Renames a media record. The stored file path never changes.
#[utoipa::path(
    patch,
    path = "/api/media/{id}",
    tag = "media",
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Updated record", body = MediaSummary),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found or not visible"),
    ),
)]
#[tracing::instrument(skip(state, request), fields(user_id = %caller.id))]
pub async fn rename_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<MediaSummary>, MediaError> {
    request
        .validate()
        .map_err(|e| MediaError::Validation(e.to_string()))?;

    let scope = AccessPolicy::resolve(&caller, AcceptMode::Mixed, TypeFilter::All)?;
    let record = queries::find_media_scoped(&state.db, id, &scope)
        .await?
        .ok_or(MediaError::NotFound)?;
    if record.owner_id != Some(caller.id) {
        return Err(MediaError::AccessDenied);
    }

    queries::rename_media(&state.db, id, request.name.trim()).await?;
    let updated = queries::find_media_by_id(&state.db, id)
        .await?
        .ok_or(MediaError::NotFound)?;
    Ok(Json(storage::summarize(&state.disks, updated)))
}

/// DELETE /api/media/{id}
/// Deletes a media record and its stored files.
#[utoipa::path(
    delete,
    path = "/api/media/{id}",
    tag = "media",
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller may not delete this record"),
        (status = 404, description = "Not found or not visible"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id))]
pub async fn delete_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, MediaError> {
    caller.require(Capability::DELETE_MEDIA)?;
    let scope = AccessPolicy::resolve(&caller, AcceptMode::Mixed, TypeFilter::All)?;
    let record = queries::find_media_scoped(&state.db, id, &scope)
        .await?
        .ok_or(MediaError::NotFound)?;
    if record.owner_id != Some(caller.id) {
        caller.require(Capability::DELETE_OTHERS_MEDIA)?;
    }

    queries::delete_media(&state.db, id).await?;

    // The record is gone; file removal failures only leak disk space
    if let Ok(disk) = state.disks.get(&record.disk) {
        if let Err(e) = disk.delete(&record.path).await {
            tracing::warn!(media_id = %id, error = %e, "Failed to remove media file");
        }
        if let Some(thumb) = &record.thumbnail_path {
            if let Err(e) = disk.delete(thumb).await {
                tracing::warn!(media_id = %id, error = %e, "Failed to remove thumbnail");
            }
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

fn upload_rules(state: &AppState, accept_mode: AcceptMode) -> UploadRules {
    UploadRules {
        accept_mode,
        max_kb: state.config.max_upload_kb,
        constraints: mm_common::DimensionConstraints {
            max_width: Some(state.config.max_image_width),
            max_height: Some(state.config.max_image_height),
            min_width: None,
            min_height: None,
        },
        allowed_mimes: state.config.allowed_mime_types.clone(),
    }
}

/// Build a download response with the standard safety headers.
pub(super) fn file_response(content_type: &str, file_name: &str, body: Vec<u8>) -> Response {
    let disposition = if content_type.starts_with("image/") {
        "inline"
    } else {
        "attachment"
    };
    let headers = [
        (CONTENT_TYPE, content_type.to_string()),
        (
            CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{file_name}\""),
        ),
        (
            CACHE_CONTROL,
            "private, max-age=31536000, immutable".to_string(),
        ),
        (
            HeaderName::from_static("x-content-type-options"),
            "nosniff".to_string(),
        ),
    ];
    (headers, body).into_response()
}
