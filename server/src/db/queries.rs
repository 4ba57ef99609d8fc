//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.
//! The scoping predicate is shared between listing and single-record
//! lookup so a record hidden from a listing can never be fetched by id.

use chrono::Utc;
use mm_common::{MediaSort, TypeFilter};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::error;
use uuid::Uuid;

use super::models::{AttachmentRecord, MediaRecord, NewMedia};
use crate::permissions::MediaScope;

/// Log and return a database error with context.
///
/// This helper ensures all database errors are logged with relevant context
/// before being propagated, making production debugging easier.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

// ============================================================================
// Media Queries
// ============================================================================

/// Listing parameters resolved by the pagination engine.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    /// Visibility scope from the access policy.
    pub scope: MediaScope,
    /// Case-insensitive substring search over name and original filename.
    pub search: Option<String>,
    /// Sort order (id tie-break keeps pagination stable).
    pub sort: MediaSort,
    /// Maximum rows to return.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

/// Insert a new media record and return it.
pub async fn create_media(pool: &SqlitePool, new: &NewMedia) -> sqlx::Result<MediaRecord> {
    let record = MediaRecord {
        id: Uuid::now_v7(),
        name: new.name.clone(),
        file_name: new.file_name.clone(),
        disk: new.disk.clone(),
        path: new.path.clone(),
        thumbnail_path: new.thumbnail_path.clone(),
        mime_type: new.mime_type.clone(),
        extension: new.extension.clone(),
        size_bytes: new.size_bytes,
        optimized_size_bytes: new.optimized_size_bytes,
        width: new.width,
        height: new.height,
        blurhash: new.blurhash.clone(),
        owner_id: new.owner_id,
        branch_id: new.branch_id,
        created_at: Utc::now(),
    };

    sqlx::query(
        r"
        INSERT INTO media (
            id, name, file_name, disk, path, thumbnail_path, mime_type,
            extension, size_bytes, optimized_size_bytes, width, height,
            blurhash, owner_id, branch_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ",
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(&record.file_name)
    .bind(&record.disk)
    .bind(&record.path)
    .bind(&record.thumbnail_path)
    .bind(&record.mime_type)
    .bind(&record.extension)
    .bind(record.size_bytes)
    .bind(record.optimized_size_bytes)
    .bind(record.width)
    .bind(record.height)
    .bind(&record.blurhash)
    .bind(record.owner_id)
    .bind(record.branch_id)
    .bind(record.created_at)
    .execute(pool)
    .await
    .map_err(db_error!("create_media", media_id = %record.id))?;

    Ok(record)
}

/// Find a media record by ID without scoping.
///
/// Internal use only (cleanup, ownership checks after a scoped lookup);
/// caller-facing lookups go through [`find_media_scoped`].
pub async fn find_media_by_id(pool: &SqlitePool, id: Uuid) -> sqlx::Result<Option<MediaRecord>> {
    sqlx::query_as::<_, MediaRecord>("SELECT * FROM media WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_media_by_id", media_id = %id))
}

/// Find a media record by ID, applying the same visibility predicate as
/// listing. Out-of-scope records come back as `None`.
pub async fn find_media_scoped(
    pool: &SqlitePool,
    id: Uuid,
    scope: &MediaScope,
) -> sqlx::Result<Option<MediaRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM media WHERE id = ");
    builder.push_bind(id);
    push_scope_predicate(&mut builder, scope, None);

    builder
        .build_query_as::<MediaRecord>()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_media_scoped", media_id = %id))
}

/// List media records under a scope with search, sort, and pagination.
pub async fn list_media(pool: &SqlitePool, query: &MediaQuery) -> sqlx::Result<Vec<MediaRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM media WHERE 1 = 1");
    push_scope_predicate(&mut builder, &query.scope, query.search.as_deref());

    match query.sort {
        MediaSort::NewestFirst => builder.push(" ORDER BY created_at DESC, id DESC"),
        MediaSort::OldestFirst => builder.push(" ORDER BY created_at ASC, id ASC"),
        MediaSort::NameAsc => builder.push(" ORDER BY LOWER(name) ASC, id ASC"),
        MediaSort::NameDesc => builder.push(" ORDER BY LOWER(name) DESC, id DESC"),
    };

    builder.push(" LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset);

    builder
        .build_query_as::<MediaRecord>()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_media", limit = query.limit, offset = query.offset))
}

/// Count media records visible under a scope.
pub async fn count_media(
    pool: &SqlitePool,
    scope: &MediaScope,
    search: Option<&str>,
) -> sqlx::Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM media WHERE 1 = 1");
    push_scope_predicate(&mut builder, scope, search);

    let (count,): (i64,) = builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(db_error!("count_media", filter = ?scope.filter))?;
    Ok(count)
}

/// Rename a media record. Only the descriptive name is mutable;
/// `disk`/`path` are immutable after insert.
pub async fn rename_media(pool: &SqlitePool, id: Uuid, name: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE media SET name = $1 WHERE id = $2")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("rename_media", media_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Delete a media record. Returns whether a row was removed.
pub async fn delete_media(pool: &SqlitePool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM media WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_media", media_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Shared visibility predicate: branch scope, owner scope, type filter,
/// and name/filename substring search. Emits only `AND` clauses.
fn push_scope_predicate(
    builder: &mut QueryBuilder<'_, Sqlite>,
    scope: &MediaScope,
    search: Option<&str>,
) {
    if let Some(branch_id) = scope.branch_id {
        builder.push(" AND branch_id = ");
        builder.push_bind(branch_id);
    }
    if let Some(owner_id) = scope.owner_id {
        builder.push(" AND owner_id = ");
        builder.push_bind(owner_id);
    }
    match scope.filter {
        TypeFilter::All => {}
        TypeFilter::Images => {
            builder.push(" AND mime_type LIKE 'image/%'");
        }
        TypeFilter::Documents => {
            builder.push(" AND mime_type NOT LIKE 'image/%'");
        }
    }
    if let Some(term) = search.filter(|t| !t.trim().is_empty()) {
        let pattern = format!(
            "%{}%",
            term.trim()
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        builder.push(" AND (LOWER(name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR LOWER(file_name) LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

// ============================================================================
// Attachment Queries
// ============================================================================

/// Parameters for inserting an attachment record.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub parent_kind: String,
    pub parent_id: Uuid,
    pub disk: String,
    pub path: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub owner_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

/// Insert an attachment record inside an open transaction.
pub async fn create_attachment(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    new: &NewAttachment,
) -> sqlx::Result<AttachmentRecord> {
    let record = AttachmentRecord {
        id: Uuid::now_v7(),
        parent_kind: new.parent_kind.clone(),
        parent_id: new.parent_id,
        disk: new.disk.clone(),
        path: new.path.clone(),
        file_name: new.file_name.clone(),
        mime_type: new.mime_type.clone(),
        size_bytes: new.size_bytes,
        sha256: new.sha256.clone(),
        owner_id: new.owner_id,
        branch_id: new.branch_id,
        created_at: Utc::now(),
    };

    sqlx::query(
        r"
        INSERT INTO attachments (
            id, parent_kind, parent_id, disk, path, file_name, mime_type,
            size_bytes, sha256, owner_id, branch_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(record.id)
    .bind(&record.parent_kind)
    .bind(record.parent_id)
    .bind(&record.disk)
    .bind(&record.path)
    .bind(&record.file_name)
    .bind(&record.mime_type)
    .bind(record.size_bytes)
    .bind(&record.sha256)
    .bind(record.owner_id)
    .bind(record.branch_id)
    .bind(record.created_at)
    .execute(&mut **tx)
    .await
    .map_err(db_error!("create_attachment", attachment_id = %record.id))?;

    Ok(record)
}

/// List attachments for a business entity, newest first.
pub async fn list_attachments(
    pool: &SqlitePool,
    parent_kind: &str,
    parent_id: Uuid,
) -> sqlx::Result<Vec<AttachmentRecord>> {
    sqlx::query_as::<_, AttachmentRecord>(
        r"
        SELECT * FROM attachments
        WHERE parent_kind = $1 AND parent_id = $2
        ORDER BY created_at DESC, id DESC
        ",
    )
    .bind(parent_kind)
    .bind(parent_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_attachments", parent_id = %parent_id))
}

/// Count attachment records (used by batch rollback verification).
pub async fn count_attachments(
    pool: &SqlitePool,
    parent_kind: &str,
    parent_id: Uuid,
) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM attachments WHERE parent_kind = $1 AND parent_id = $2",
    )
    .bind(parent_kind)
    .bind(parent_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("count_attachments", parent_id = %parent_id))?;
    Ok(count)
}
