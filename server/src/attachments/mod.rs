//! Attachment Batches
//!
//! Attaches a set of uploaded files to a business entity (note, ticket,
//! project) in one all-or-nothing operation: every file validates before
//! any byte is written, records are inserted inside one transaction, and
//! a failure anywhere removes every file written so far. A stored
//! attachment is read back and its content hash verified before the
//! batch commits.

use hex::ToHex;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::models::AttachmentRecord;
use crate::db::queries::{self, NewAttachment};
use crate::error::MediaError;
use crate::media::{validate_upload, UploadRequest, UploadRules, ValidatedUpload};
use crate::permissions::{Caller, Capability};
use crate::storage::{DiskRegistry, LocalDisk};

/// Where a batch of attachments belongs.
#[derive(Debug, Clone)]
pub struct AttachmentParent {
    /// Entity kind, e.g. `"note"`, `"ticket"`, `"project"`.
    pub kind: String,
    /// Entity identifier.
    pub id: Uuid,
}

/// Store a batch of files as attachments of one parent entity.
///
/// All-or-nothing: on success every file is on disk with a matching
/// record; on failure no file and no record remains and the first error
/// is returned unchanged.
pub async fn store_all(
    pool: &SqlitePool,
    disks: &DiskRegistry,
    caller: &Caller,
    disk_name: &str,
    parent: &AttachmentParent,
    uploads: Vec<UploadRequest>,
    rules: &UploadRules,
) -> Result<Vec<AttachmentRecord>, MediaError> {
    caller.require(Capability::MANAGE_ATTACHMENTS)?;
    if uploads.is_empty() {
        return Err(MediaError::NoFile);
    }
    let disk = disks.get(disk_name)?;

    // Validate everything before touching disk or database
    let mut validated = Vec::with_capacity(uploads.len());
    for upload in uploads {
        validated.push(validate_upload(upload, rules)?);
    }

    let mut tx = pool.begin().await?;
    let mut written: Vec<String> = Vec::with_capacity(validated.len());
    let mut records = Vec::with_capacity(validated.len());

    for upload in validated {
        let sha256 = digest_hex(&upload.data);
        match store_one(&mut tx, disk, caller, parent, &upload, sha256, &mut written).await {
            Ok(record) => records.push(record),
            Err(e) => {
                cleanup(disk, &written).await;
                // Dropping the transaction rolls the inserts back
                return Err(e);
            }
        }
    }

    if let Err(e) = tx.commit().await {
        cleanup(disk, &written).await;
        return Err(MediaError::Database(e));
    }
    Ok(records)
}

/// Write one batch member and verify it against `sha256`, the hash of
/// the bytes the caller intended to store.
async fn store_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    disk: &LocalDisk,
    caller: &Caller,
    parent: &AttachmentParent,
    upload: &ValidatedUpload,
    sha256: String,
    written: &mut Vec<String>,
) -> Result<AttachmentRecord, MediaError> {
    let path = format!(
        "{}/{}/{}.{}",
        parent.kind,
        parent.id.simple(),
        Uuid::now_v7().simple(),
        upload.extension
    );

    disk.write(&path, &upload.data).await?;
    written.push(path.clone());

    verify_stored(disk, &path, &sha256).await?;

    let record = queries::create_attachment(
        tx,
        &NewAttachment {
            parent_kind: parent.kind.clone(),
            parent_id: parent.id,
            disk: disk.name().to_string(),
            path,
            file_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: i64::try_from(upload.data.len()).unwrap_or(i64::MAX),
            sha256,
            owner_id: Some(caller.id),
            branch_id: caller.branch_id,
        },
    )
    .await?;
    Ok(record)
}

/// Read a just-written file back and compare its content hash. Catches
/// short writes and disks that lie about success before the batch is
/// allowed to commit.
async fn verify_stored(disk: &LocalDisk, path: &str, expected_sha256: &str) -> Result<(), MediaError> {
    let stored = disk.read(path).await?;
    let actual = digest_hex(&stored);
    if actual == expected_sha256 {
        Ok(())
    } else {
        warn!(path = %path, "Stored attachment failed hash verification");
        Err(MediaError::Storage(format!(
            "Attachment verification failed for {path}"
        )))
    }
}

async fn cleanup(disk: &LocalDisk, written: &[String]) {
    for path in written {
        if let Err(e) = disk.delete(path).await {
            warn!(path = %path, error = %e, "Batch cleanup failed to remove file");
        }
    }
}

fn digest_hex(data: &[u8]) -> String {
    Sha256::digest(data).encode_hex::<String>()
}
