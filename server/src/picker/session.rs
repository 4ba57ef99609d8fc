//! Picker session state machine.

use std::collections::HashSet;
use std::sync::Arc;

use mm_common::{
    AcceptMode, DimensionConstraints, FileInfo, MediaSort, MediaSummary, PickerEvent, StorageScope,
    TypeFilter,
};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::queries::{self, MediaQuery};
use crate::error::MediaError;
use crate::media::{validate_upload, UploadRequest, UploadRules};
use crate::permissions::{AccessPolicy, Caller, Capability};
use crate::storage::{self, path_guard, DiskRegistry, StoredReference};

/// Items fetched per incremental load.
pub const PAGE_SIZE: i64 = 24;

/// Immutable per-session configuration, frozen at mount.
///
/// In particular the accept mode is resolved once here and never
/// re-interpreted afterwards.
#[derive(Debug, Clone)]
pub struct PickerConfig {
    /// Form field this session is bound to.
    pub field_id: String,
    /// Fixed type constraint.
    pub accept_mode: AcceptMode,
    /// Managed catalog vs direct disk storage.
    pub storage_scope: StorageScope,
    /// Named disk uploads land on.
    pub disk: String,
    /// Directory uploads land under (direct scope; empty = disk root).
    pub directory: String,
    /// Maximum upload size in kilobytes.
    pub max_kb: u64,
    /// Pixel dimension constraints for image uploads.
    pub constraints: DimensionConstraints,
    /// Custom MIME allow-list overriding the per-mode defaults.
    pub allowed_mimes: Option<Vec<String>>,
    /// Pre-existing managed selection to hydrate (managed scope).
    pub initial_media_id: Option<Uuid>,
    /// Pre-existing file selection to hydrate (direct scope).
    pub initial_path: Option<String>,
}

/// What the session currently holds for its field.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Nothing selected.
    Empty,
    /// A managed catalog record.
    Media(Box<MediaSummary>),
    /// A direct file on a named disk.
    File {
        path: String,
        info: Box<FileInfo>,
    },
}

impl Selection {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The stable reference a consuming form persists for this selection.
    #[must_use]
    pub fn stored_reference(&self) -> Option<StoredReference> {
        match self {
            Self::Empty => None,
            Self::Media(media) => Some(StoredReference::Media(media.id)),
            Self::File { path, .. } => Some(StoredReference::Path(path.clone())),
        }
    }
}

/// One mounted picker bound to one form field.
///
/// All mutating operations take `&mut self`; the `loading` flag
/// additionally guards against re-entrant load triggers from UI event
/// storms arriving while a previous load is still being applied.
pub struct PickerSession {
    db: SqlitePool,
    disks: Arc<DiskRegistry>,
    caller: Caller,
    config: PickerConfig,

    selection: Selection,
    modal_open: bool,

    search: Option<String>,
    sort: MediaSort,
    filter: TypeFilter,

    items: Vec<MediaSummary>,
    loaded_ids: HashSet<Uuid>,
    offset: i64,
    has_more: bool,
    loading: bool,
}

impl PickerSession {
    /// Mount a session, hydrating any initial selection.
    ///
    /// An initial reference that is missing or outside the caller's
    /// visibility starts the session empty rather than failing the
    /// mount; the reference is logged.
    pub async fn mount(
        db: SqlitePool,
        disks: Arc<DiskRegistry>,
        caller: Caller,
        config: PickerConfig,
    ) -> Result<Self, MediaError> {
        let filter = config.accept_mode.default_filter();
        let mut session = Self {
            db,
            disks,
            caller,
            config,
            selection: Selection::Empty,
            modal_open: false,
            search: None,
            sort: MediaSort::default(),
            filter,
            items: Vec::new(),
            loaded_ids: HashSet::new(),
            offset: 0,
            has_more: true,
            loading: false,
        };
        session.hydrate_initial().await?;
        Ok(session)
    }

    async fn hydrate_initial(&mut self) -> Result<(), MediaError> {
        match self.config.storage_scope {
            StorageScope::Media => {
                let Some(id) = self.config.initial_media_id else {
                    return Ok(());
                };
                let scope =
                    AccessPolicy::resolve(&self.caller, self.config.accept_mode, self.filter)?;
                match queries::find_media_scoped(&self.db, id, &scope).await? {
                    Some(record) => {
                        let summary = storage::summarize(&self.disks, record);
                        self.selection = Selection::Media(Box::new(summary));
                    }
                    None => {
                        warn!(media_id = %id, "Initial media reference not visible, starting empty");
                    }
                }
            }
            StorageScope::Direct => {
                let Some(path) = self.config.initial_path.clone() else {
                    return Ok(());
                };
                // The accept mode binds hydration too: a reference to a
                // file of the wrong kind starts the session empty, like a
                // missing one.
                let probed = self
                    .probe_direct(&path)
                    .await
                    .and_then(|info| self.check_file_type(&info).map(|()| info));
                match probed {
                    Ok(info) => {
                        self.selection = Selection::File {
                            path,
                            info: Box::new(info),
                        };
                    }
                    Err(e) => {
                        warn!(path = %path, error = %e, "Initial file reference not usable, starting empty");
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Browse modal
    // ------------------------------------------------------------------

    /// Open the browse modal and load the first page (managed scope).
    pub async fn open(&mut self) -> Result<(), MediaError> {
        self.caller.require(Capability::VIEW_MEDIA)?;
        self.modal_open = true;
        if self.config.storage_scope == StorageScope::Media {
            self.reset_listing();
            self.load_more().await?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.modal_open = false;
    }

    /// Replace the search term and reload from the first page.
    pub async fn set_search(&mut self, term: Option<String>) -> Result<(), MediaError> {
        self.search = term.filter(|t| !t.trim().is_empty());
        self.reload().await
    }

    /// Replace the sort order and reload from the first page.
    pub async fn set_sort(&mut self, sort: MediaSort) -> Result<(), MediaError> {
        self.sort = sort;
        self.reload().await
    }

    /// Request a type filter change.
    ///
    /// Outside mixed mode the filter is locked to the accept mode's
    /// default and the request is ignored.
    pub async fn set_filter(&mut self, filter: TypeFilter) -> Result<(), MediaError> {
        if self.config.accept_mode.filter_adjustable() {
            self.filter = filter;
        } else {
            self.filter = self.config.accept_mode.default_filter();
        }
        self.reload().await
    }

    async fn reload(&mut self) -> Result<(), MediaError> {
        self.reset_listing();
        if self.modal_open && self.config.storage_scope == StorageScope::Media {
            self.load_more().await?;
        }
        Ok(())
    }

    fn reset_listing(&mut self) {
        self.items.clear();
        self.loaded_ids.clear();
        self.offset = 0;
        self.has_more = true;
    }

    /// Fetch and append the next page.
    ///
    /// Re-entrant triggers while a load is already being applied are
    /// dropped, and rows already present are skipped, so repeated rapid
    /// triggers cannot duplicate items or skip a page.
    pub async fn load_more(&mut self) -> Result<(), MediaError> {
        if self.loading || !self.has_more {
            return Ok(());
        }
        self.loading = true;
        let result = self.fetch_page().await;
        self.loading = false;
        result
    }

    async fn fetch_page(&mut self) -> Result<(), MediaError> {
        let scope = AccessPolicy::resolve(&self.caller, self.config.accept_mode, self.filter)?;
        // One extra row decides has_more without a second count query
        let query = MediaQuery {
            scope,
            search: self.search.clone(),
            sort: self.sort,
            limit: PAGE_SIZE + 1,
            offset: self.offset,
        };
        let mut rows = queries::list_media(&self.db, &query).await?;

        self.has_more = rows.len() as i64 > PAGE_SIZE;
        rows.truncate(usize::try_from(PAGE_SIZE).unwrap_or(usize::MAX));
        self.offset += rows.len() as i64;

        for record in rows {
            if !self.loaded_ids.insert(record.id) {
                continue;
            }
            self.items.push(storage::summarize(&self.disks, record));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select an existing managed record by id.
    ///
    /// The lookup runs under the same scope as listing; an out-of-scope
    /// id reads as not found.
    pub async fn select_media(&mut self, id: Uuid) -> Result<PickerEvent, MediaError> {
        self.require_scope(StorageScope::Media)?;
        let scope = AccessPolicy::resolve(&self.caller, self.config.accept_mode, self.filter)?;
        let record = queries::find_media_scoped(&self.db, id, &scope)
            .await?
            .ok_or(MediaError::NotFound)?;

        let summary = storage::summarize(&self.disks, record);
        self.selection = Selection::Media(Box::new(summary.clone()));
        self.modal_open = false;
        Ok(PickerEvent::MediaSelected {
            field_id: self.config.field_id.clone(),
            media_id: id,
            media: Box::new(summary),
        })
    }

    /// Select an existing direct file by disk-relative path.
    pub async fn choose_file(&mut self, path: &str) -> Result<PickerEvent, MediaError> {
        self.require_scope(StorageScope::Direct)?;
        self.caller.require(Capability::VIEW_MEDIA)?;
        let info = self.probe_direct(path).await?;
        self.check_file_type(&info)?;

        self.selection = Selection::File {
            path: path.to_string(),
            info: Box::new(info.clone()),
        };
        self.modal_open = false;
        Ok(PickerEvent::FileUploaded {
            field_id: self.config.field_id.clone(),
            path: path.to_string(),
            info: Box::new(info),
        })
    }

    /// Upload a new file through the validation gate, store it per the
    /// session's storage scope, and make it the current selection.
    pub async fn upload(&mut self, request: UploadRequest) -> Result<PickerEvent, MediaError> {
        self.caller.require(Capability::UPLOAD_MEDIA)?;
        let rules = UploadRules {
            accept_mode: self.config.accept_mode,
            max_kb: self.config.max_kb,
            constraints: self.config.constraints,
            allowed_mimes: self.config.allowed_mimes.clone(),
        };
        let validated = validate_upload(request, &rules)?;

        let event = match self.config.storage_scope {
            StorageScope::Media => {
                let record = storage::store_managed(
                    &self.db,
                    &self.disks,
                    &self.caller,
                    &self.config.disk,
                    None,
                    validated,
                )
                .await?;
                let media_id = record.id;
                let summary = storage::summarize(&self.disks, record);
                self.selection = Selection::Media(Box::new(summary.clone()));
                PickerEvent::MediaSelected {
                    field_id: self.config.field_id.clone(),
                    media_id,
                    media: Box::new(summary),
                }
            }
            StorageScope::Direct => {
                let (path, info) = storage::store_direct(
                    &self.disks,
                    &self.config.disk,
                    &self.config.directory,
                    &validated,
                )
                .await?;
                self.selection = Selection::File {
                    path: path.clone(),
                    info: Box::new(info.clone()),
                };
                PickerEvent::FileUploaded {
                    field_id: self.config.field_id.clone(),
                    path,
                    info: Box::new(info),
                }
            }
        };
        self.modal_open = false;
        Ok(event)
    }

    /// Clear the current selection.
    ///
    /// Idempotent, and always emits the cleared event so a consuming
    /// form resets even when its state drifted from the session's.
    pub fn clear(&mut self) -> PickerEvent {
        self.selection = Selection::Empty;
        match self.config.storage_scope {
            StorageScope::Media => PickerEvent::MediaCleared {
                field_id: self.config.field_id.clone(),
            },
            StorageScope::Direct => PickerEvent::FileCleared {
                field_id: self.config.field_id.clone(),
            },
        }
    }

    /// List files under the session's directory (direct scope).
    pub async fn list_files(&self) -> Result<Vec<FileInfo>, MediaError> {
        self.require_scope(StorageScope::Direct)?;
        self.caller.require(Capability::VIEW_MEDIA)?;
        let disk = self.disks.get(&self.config.disk)?;
        let mut infos = Vec::new();
        for path in disk.list(&self.config.directory).await? {
            infos.push(disk.file_info(&path).await?);
        }
        Ok(infos)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn items(&self) -> &[MediaSummary] {
        &self.items
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.modal_open
    }

    #[must_use]
    pub const fn filter(&self) -> TypeFilter {
        self.filter
    }

    #[must_use]
    pub const fn config(&self) -> &PickerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_scope(&self, scope: StorageScope) -> Result<(), MediaError> {
        if self.config.storage_scope == scope {
            Ok(())
        } else {
            Err(MediaError::Validation(format!(
                "Operation not available in {:?} storage scope",
                self.config.storage_scope
            )))
        }
    }

    /// Guard, root-check, and probe a direct path.
    async fn probe_direct(&self, path: &str) -> Result<FileInfo, MediaError> {
        path_guard::ensure_safe(path)?;
        path_guard::ensure_within_root(path, &self.config.directory)?;
        let disk = self.disks.get(&self.config.disk)?;
        disk.file_info(path).await
    }

    /// Reject a chosen file whose probed type violates the accept mode.
    fn check_file_type(&self, info: &FileInfo) -> Result<(), MediaError> {
        let ok = match self.config.accept_mode {
            AcceptMode::Image => info.is_image(),
            AcceptMode::File => !info.is_image(),
            AcceptMode::Mixed => true,
        };
        if ok {
            Ok(())
        } else {
            Err(MediaError::Validation(format!(
                "File type {} is not accepted here",
                info.mime_type
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskDefinition;
    use crate::db::models::NewMedia;
    use std::io::Cursor;

    fn registry() -> (tempfile::TempDir, Arc<DiskRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = DiskRegistry::new(&[
            DiskDefinition {
                name: "media".into(),
                root: dir.path().join("media"),
            },
            DiskDefinition {
                name: "files".into(),
                root: dir.path().join("files"),
            },
        ]);
        (dir, Arc::new(registry))
    }

    fn caller(capabilities: Capability, branch_id: Option<Uuid>) -> Caller {
        Caller {
            id: Uuid::now_v7(),
            branch_id,
            capabilities,
        }
    }

    fn media_config(field_id: &str, accept_mode: AcceptMode) -> PickerConfig {
        PickerConfig {
            field_id: field_id.into(),
            accept_mode,
            storage_scope: StorageScope::Media,
            disk: "media".into(),
            directory: String::new(),
            max_kb: 10 * 1024,
            constraints: DimensionConstraints::default(),
            allowed_mimes: None,
            initial_media_id: None,
            initial_path: None,
        }
    }

    fn direct_config(field_id: &str, directory: &str) -> PickerConfig {
        PickerConfig {
            field_id: field_id.into(),
            accept_mode: AcceptMode::Mixed,
            storage_scope: StorageScope::Direct,
            disk: "files".into(),
            directory: directory.into(),
            max_kb: 10 * 1024,
            constraints: DimensionConstraints::default(),
            allowed_mimes: None,
            initial_media_id: None,
            initial_path: None,
        }
    }

    async fn seed_media(
        pool: &SqlitePool,
        name: &str,
        mime: &str,
        owner_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Uuid {
        let record = queries::create_media(
            pool,
            &NewMedia {
                name: name.into(),
                file_name: format!("{name}.bin"),
                disk: "media".into(),
                path: format!("seed/{name}.bin"),
                thumbnail_path: None,
                mime_type: mime.into(),
                extension: "bin".into(),
                size_bytes: 10,
                optimized_size_bytes: None,
                width: None,
                height: None,
                blurhash: None,
                owner_id: Some(owner_id),
                branch_id,
            },
        )
        .await
        .unwrap();
        record.id
    }

    fn png_request(name: &str) -> UploadRequest {
        use image::{DynamicImage, ImageFormat};
        let img = DynamicImage::new_rgba8(16, 16);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        UploadRequest {
            file_name: name.into(),
            declared_mime: Some("image/png".into()),
            data: buf.into_inner(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_mount_with_invisible_initial_starts_empty(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let branch = Uuid::now_v7();
        let me = caller(Capability::VIEW_MEDIA, Some(branch));
        let other_branch = Uuid::now_v7();
        let hidden = seed_media(&pool, "hidden", "image/png", me.id, Some(other_branch)).await;

        let mut config = media_config("avatar", AcceptMode::Mixed);
        config.initial_media_id = Some(hidden);
        let session = PickerSession::mount(pool, disks, me, config).await.unwrap();
        assert!(session.selection().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_mount_direct_initial_of_wrong_type_starts_empty(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let disk = disks.get("files").unwrap();
        disk.write("contracts/terms.txt", b"agreed").await.unwrap();

        let me = caller(Capability::VIEW_MEDIA, None);
        let mut config = direct_config("scan", "contracts");
        config.accept_mode = AcceptMode::Image;
        config.initial_path = Some("contracts/terms.txt".into());

        // An image-only picker must not hydrate a text file
        let session = PickerSession::mount(pool.clone(), disks.clone(), me.clone(), config)
            .await
            .unwrap();
        assert!(session.selection().is_empty());

        // The same reference hydrates fine when the mode admits it
        let mut config = direct_config("doc", "contracts");
        config.initial_path = Some("contracts/terms.txt".into());
        let session = PickerSession::mount(pool, disks, me, config).await.unwrap();
        assert!(matches!(session.selection(), Selection::File { .. }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_filter_locked_in_image_mode(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        let mut session = PickerSession::mount(pool, disks, me, media_config("logo", AcceptMode::Image))
            .await
            .unwrap();

        assert_eq!(session.filter(), TypeFilter::Images);
        session.set_filter(TypeFilter::Documents).await.unwrap();
        assert_eq!(session.filter(), TypeFilter::Images);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_pagination_no_duplicates(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        for i in 0..30 {
            seed_media(&pool, &format!("item-{i:02}"), "image/png", me.id, None).await;
        }

        let mut session =
            PickerSession::mount(pool, disks, me, media_config("gallery", AcceptMode::Mixed))
                .await
                .unwrap();
        session.open().await.unwrap();

        assert_eq!(session.items().len() as i64, PAGE_SIZE);
        assert!(session.has_more());

        session.load_more().await.unwrap();
        assert_eq!(session.items().len(), 30);
        assert!(!session.has_more());

        // Further triggers are no-ops
        session.load_more().await.unwrap();
        assert_eq!(session.items().len(), 30);

        let mut ids: Vec<Uuid> = session.items().iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 30, "no item may appear twice");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_search_resets_listing(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        seed_media(&pool, "invoice-march", "application/pdf", me.id, None).await;
        seed_media(&pool, "holiday-photo", "image/png", me.id, None).await;

        let mut session =
            PickerSession::mount(pool, disks, me, media_config("doc", AcceptMode::Mixed))
                .await
                .unwrap();
        session.open().await.unwrap();
        assert_eq!(session.items().len(), 2);

        session.set_search(Some("invoice".into())).await.unwrap();
        assert_eq!(session.items().len(), 1);
        assert_eq!(session.items()[0].name, "invoice-march");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_select_out_of_scope_is_not_found(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, Some(Uuid::now_v7()));
        let foreign =
            seed_media(&pool, "foreign", "image/png", Uuid::now_v7(), Some(Uuid::now_v7())).await;

        let mut session =
            PickerSession::mount(pool, disks, me, media_config("pic", AcceptMode::Mixed))
                .await
                .unwrap();
        let err = session.select_media(foreign).await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound));
        assert!(session.selection().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_select_emits_event_and_closes_modal(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        let id = seed_media(&pool, "mine", "image/png", me.id, None).await;

        let mut session =
            PickerSession::mount(pool, disks, me, media_config("avatar", AcceptMode::Mixed))
                .await
                .unwrap();
        session.open().await.unwrap();
        assert!(session.is_open());

        let event = session.select_media(id).await.unwrap();
        assert_eq!(event.field_id(), "avatar");
        assert_eq!(event.reference(), Some(id.to_string()));
        assert!(!session.is_open());
        assert!(matches!(session.selection(), Selection::Media(_)));
        let reference = session.selection().stored_reference().unwrap();
        assert_eq!(reference.as_media_id(), Some(id));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_upload_requires_capability(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        let mut session =
            PickerSession::mount(pool, disks, me, media_config("logo", AcceptMode::Image))
                .await
                .unwrap();
        let err = session.upload(png_request("logo.png")).await.unwrap_err();
        assert!(matches!(err, MediaError::AccessDenied));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_upload_managed_selects_new_record(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA | Capability::UPLOAD_MEDIA, None);
        let mut session =
            PickerSession::mount(pool, disks, me, media_config("logo", AcceptMode::Image))
                .await
                .unwrap();

        let event = session.upload(png_request("logo.png")).await.unwrap();
        let PickerEvent::MediaSelected { field_id, media, .. } = event else {
            panic!("expected media_selected");
        };
        assert_eq!(field_id, "logo");
        assert_eq!(media.file_name, "logo.png");
        assert!(matches!(session.selection(), Selection::Media(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_upload_direct_emits_file_event(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA | Capability::UPLOAD_MEDIA, None);
        let mut session =
            PickerSession::mount(pool, disks, me, direct_config("contract", "contracts"))
                .await
                .unwrap();

        let event = session
            .upload(UploadRequest {
                file_name: "terms.txt".into(),
                declared_mime: Some("text/plain".into()),
                data: b"agreed".to_vec(),
            })
            .await
            .unwrap();
        let PickerEvent::FileUploaded { path, info, .. } = event else {
            panic!("expected file_uploaded");
        };
        assert_eq!(path, "contracts/terms.txt");
        assert_eq!(info.size_bytes, 6);
        let reference = session.selection().stored_reference().unwrap();
        assert_eq!(reference.as_path(), Some("contracts/terms.txt"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_choose_file_outside_root_is_unsafe(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let disk = disks.get("files").unwrap();
        disk.write("elsewhere/file.txt", b"x").await.unwrap();

        let me = caller(Capability::VIEW_MEDIA, None);
        let mut session =
            PickerSession::mount(pool, disks.clone(), me, direct_config("doc", "contracts"))
                .await
                .unwrap();

        assert!(matches!(
            session.choose_file("elsewhere/file.txt").await,
            Err(MediaError::PathUnsafe)
        ));
        assert!(matches!(
            session.choose_file("contracts/../elsewhere/file.txt").await,
            Err(MediaError::PathUnsafe)
        ));
        assert!(matches!(
            session.choose_file("contracts/missing.txt").await,
            Err(MediaError::NotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_clear_is_idempotent_and_always_emits(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let me = caller(Capability::VIEW_MEDIA, None);
        let mut session =
            PickerSession::mount(pool, disks, me, media_config("avatar", AcceptMode::Mixed))
                .await
                .unwrap();

        // Clearing an already-empty selection still emits
        let event = session.clear();
        assert!(matches!(event, PickerEvent::MediaCleared { .. }));
        let event = session.clear();
        assert!(matches!(event, PickerEvent::MediaCleared { .. }));
        assert!(session.selection().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_list_files_direct_scope_only(pool: SqlitePool) {
        let (_dir, disks) = registry();
        let disk = disks.get("files").unwrap();
        disk.write("contracts/a.txt", b"a").await.unwrap();
        disk.write("contracts/b.txt", b"b").await.unwrap();

        let me = caller(Capability::VIEW_MEDIA, None);
        let session =
            PickerSession::mount(pool.clone(), disks.clone(), me.clone(), direct_config("doc", "contracts"))
                .await
                .unwrap();
        let files = session.list_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.txt");

        let media_session =
            PickerSession::mount(pool, disks, me, media_config("pic", AcceptMode::Mixed))
                .await
                .unwrap();
        assert!(media_session.list_files().await.is_err());
    }
}
