//! Attachment batch handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use mm_common::AcceptMode;
use uuid::Uuid;

use crate::attachments::{self, AttachmentParent};
use crate::db::models::AttachmentRecord;
use crate::db::queries;
use crate::error::MediaError;
use crate::media::{UploadRequest, UploadRules};
use crate::permissions::{Caller, Capability};

use super::AppState;

/// Disk attachment batches land on.
const ATTACHMENTS_DISK: &str = "attachments";

/// POST /api/attachments/{parent_kind}/{parent_id}
/// Stores a multipart batch of files as attachments, all-or-nothing.
#[utoipa::path(
    post,
    path = "/api/attachments/{parent_kind}/{parent_id}",
    tag = "attachments",
    responses(
        (status = 201, description = "Stored attachment records"),
        (status = 400, description = "A file failed validation; nothing was stored"),
        (status = 403, description = "Caller may not manage attachments"),
    ),
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %caller.id, parent_id = %parent_id))]
pub async fn create_batch(
    State(state): State<AppState>,
    caller: Caller,
    Path((parent_kind, parent_id)): Path<(String, Uuid)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<AttachmentRecord>>), MediaError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MediaError::Validation(format!("Invalid multipart data: {e}")))?
    {
        // Every part carrying a filename is a batch member
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let declared_mime = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| MediaError::Validation(format!("Failed to read file: {e}")))?;
        uploads.push(UploadRequest {
            file_name,
            declared_mime,
            data: data.to_vec(),
        });
    }

    let records = attachments::store_all(
        &state.db,
        &state.disks,
        &caller,
        ATTACHMENTS_DISK,
        &AttachmentParent {
            kind: parent_kind,
            id: parent_id,
        },
        uploads,
        &UploadRules {
            accept_mode: AcceptMode::Mixed,
            max_kb: state.config.max_upload_kb,
            constraints: mm_common::DimensionConstraints::default(),
            allowed_mimes: state.config.allowed_mime_types.clone(),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(records)))
}

/// GET /api/attachments/{parent_kind}/{parent_id}
/// Lists the attachments of one business entity, newest first.
#[utoipa::path(
    get,
    path = "/api/attachments/{parent_kind}/{parent_id}",
    tag = "attachments",
    responses(
        (status = 200, description = "Attachment records"),
        (status = 403, description = "Caller may not view attachments"),
    ),
)]
#[tracing::instrument(skip(state), fields(user_id = %caller.id, parent_id = %parent_id))]
pub async fn list_batch(
    State(state): State<AppState>,
    caller: Caller,
    Path((parent_kind, parent_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<AttachmentRecord>>, MediaError> {
    caller.require(Capability::VIEW_MEDIA)?;
    let records = queries::list_attachments(&state.db, &parent_kind, parent_id).await?;
    Ok(Json(records))
}
