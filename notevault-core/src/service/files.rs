//! C6 File Service (§4.6): the tenant-facing surface that composes C1
//! (object bytes) and C2 (metadata) into single logical operations, and
//! fans out the resulting domain event via C4. Every method enforces the
//! key-formatting invariant before touching either backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use crate::event::EventPublisher;
use crate::models::{
    BatchResult, EventSource, FilePatch, FileRecord, ItemResult, MoveOutcome, ObjectEventPayload, Page,
    PageParams, Topic, UploadItem, UploadOutcome, VersionEntry,
};
use crate::repository::FileRepository;
use crate::share::ShareRegistry;
use crate::storage::{ObjectMeta, ObjectStoreGateway, PresignedPost};
use crate::{Error, Result};

pub struct FileService {
    storage: Arc<ObjectStoreGateway>,
    repo: FileRepository,
    events: Arc<EventPublisher>,
    shares: Arc<ShareRegistry>,
}

/// `list-versions(key, scope)` scope selector (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScope {
    Current,
    All,
}

/// Result of a presign-upload request: either a PUT url or a POST policy,
/// depending on which the caller asked for. No DB row is created (§4.6
/// "No DB write yet").
#[derive(Debug, Clone, serde::Serialize)]
pub struct PresignUploadResult {
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<PresignedPost>,
}

/// The key-formatting invariant (§4.6): the only authorization predicate the
/// core enforces. A tenant-prefix violation is `Forbidden`, not a malformed
/// argument — the key itself may be perfectly well-formed, just not this
/// caller's.
fn require_tenant_prefix(tenant: &str, object_key: &str) -> Result<()> {
    if FileRecord::belongs_to(tenant, object_key) {
        Ok(())
    } else {
        Err(Error::Forbidden("access denied: object does not belong to user".to_string()))
    }
}

/// `<tenant>/<YYYY>/<MM>/<file_name>` (UTC), per §4.6/§6's object-key format.
#[must_use]
pub fn build_upload_key(tenant: &str, file_name: &str, now: DateTime<Utc>) -> String {
    format!("{tenant}/{:04}/{:02}/{file_name}", now.year(), now.month())
}

/// `folder_id = md5(tenant + "/" + path)` (§4.6 "Folder operations").
#[must_use]
pub fn folder_id(tenant: &str, path: &str) -> String {
    format!("{:x}", md5::compute(format!("{tenant}/{path}").as_bytes()))
}

fn folder_marker_key(tenant: &str, path: &str) -> String {
    format!("{tenant}/{}/", path.trim_matches('/'))
}

impl FileService {
    #[must_use]
    pub fn new(
        storage: Arc<ObjectStoreGateway>,
        repo: FileRepository,
        events: Arc<EventPublisher>,
        shares: Arc<ShareRegistry>,
    ) -> Self {
        Self { storage, repo, events, shares }
    }

    // ---------------------------------------------------------------
    // Presign upload (§4.6 "Presign upload (POST-policy / PUT)")
    // ---------------------------------------------------------------

    pub async fn presign_upload_put(
        &self,
        tenant: &str,
        bucket: &str,
        file_name: &str,
        ttl: Option<Duration>,
    ) -> Result<PresignUploadResult> {
        let object_key = build_upload_key(tenant, file_name, Utc::now());
        let url = self.storage.presign_put(bucket, &object_key, ttl).await?;
        Ok(PresignUploadResult { object_key, put_url: Some(url), post: None })
    }

    pub async fn presign_upload_post(
        &self,
        tenant: &str,
        bucket: &str,
        file_name: &str,
        ttl: Option<Duration>,
        max_size_bytes: u64,
    ) -> Result<PresignUploadResult> {
        let object_key = build_upload_key(tenant, file_name, Utc::now());
        let post = self.storage.presign_post_policy(bucket, &object_key, ttl, max_size_bytes)?;
        Ok(PresignUploadResult { object_key, put_url: None, post: Some(post) })
    }

    /// Batch variant of [`Self::presign_upload_put`]: "returns one result per
    /// requested file" (§4.6).
    pub async fn presign_upload_put_batch(
        &self,
        tenant: &str,
        bucket: &str,
        file_names: Vec<String>,
        ttl: Option<Duration>,
    ) -> BatchResult<PresignUploadResult> {
        let mut results = Vec::with_capacity(file_names.len());
        for name in file_names {
            match self.presign_upload_put(tenant, bucket, &name, ttl).await {
                Ok(r) => results.push(ItemResult::ok(name, r)),
                Err(e) => results.push(ItemResult::err(name, e)),
            }
        }
        BatchResult::from_results(results)
    }

    pub async fn presign_upload_post_batch(
        &self,
        tenant: &str,
        bucket: &str,
        file_names: Vec<String>,
        ttl: Option<Duration>,
        max_size_bytes: u64,
    ) -> BatchResult<PresignUploadResult> {
        let mut results = Vec::with_capacity(file_names.len());
        for name in file_names {
            match self.presign_upload_post(tenant, bucket, &name, ttl, max_size_bytes).await {
                Ok(r) => results.push(ItemResult::ok(name, r)),
                Err(e) => results.push(ItemResult::err(name, e)),
            }
        }
        BatchResult::from_results(results)
    }

    // ---------------------------------------------------------------
    // Direct upload (§4.6 "Direct upload (single / batch)")
    // ---------------------------------------------------------------

    /// Streams `data` through an MD5 hashing tee before it ever reaches C1,
    /// returning the computed hash alongside the stored record. On success
    /// emits `ObjectStored` then `ObjectUpdated`, per §4.6's literal order.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload(
        &self,
        tenant: &str,
        object_key: &str,
        bucket: &str,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
        category: &str,
        description: &str,
        tags: Vec<String>,
    ) -> Result<UploadOutcome> {
        require_tenant_prefix(tenant, object_key)?;

        let content_md5 = format!("{:x}", md5::compute(&data));
        let object_meta = self.storage.put(bucket, object_key, data, Some(content_type)).await?;

        let now = Utc::now();
        let initial = FileRecord {
            id: String::new(),
            tenant: tenant.to_string(),
            object_key: object_key.to_string(),
            file_name: file_name.to_string(),
            size: object_meta.size as i64,
            etag: object_meta.etag.clone().unwrap_or_default(),
            content_type: content_type.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            tags,
            bucket: bucket.to_string(),
            version_id: object_meta.version_id.clone(),
            storage_class: "STANDARD".to_string(),
            last_modified: object_meta.last_modified.unwrap_or(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let patch = FilePatch {
            size: Some(object_meta.size as i64),
            etag: object_meta.etag.clone(),
            content_type: Some(content_type.to_string()),
            version_id: object_meta.version_id.clone(),
            last_modified: object_meta.last_modified,
            ..Default::default()
        };

        let record = self.repo.upsert(tenant, object_key, &initial, &patch).await?;

        self.events
            .publish_topic(Topic::Stored, object_event_payload(&record, &object_meta, EventSource::Upload))
            .await;
        self.events
            .publish_topic(Topic::Updated, object_event_payload(&record, &object_meta, EventSource::Upload))
            .await;

        Ok(UploadOutcome { record, content_md5 })
    }

    /// Best-effort batch upload (§4.6 "Batch is best-effort per item").
    pub async fn upload_batch(&self, tenant: &str, items: Vec<UploadItem>) -> BatchResult<UploadOutcome> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let key = item.object_key.clone();
            let outcome = self
                .upload(
                    tenant,
                    &item.object_key,
                    &item.bucket,
                    item.data,
                    &item.file_name,
                    &item.content_type,
                    &item.category,
                    &item.description,
                    item.tags,
                )
                .await;
            match outcome {
                Ok(o) => results.push(ItemResult::ok(key, o)),
                Err(e) => results.push(ItemResult::err(key, e)),
            }
        }
        BatchResult::from_results(results)
    }

    pub async fn download(&self, tenant: &str, object_key: &str) -> Result<(Vec<u8>, FileRecord)> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;
        let data = self.storage.get(&record.bucket, object_key).await?;

        self.events
            .publish_topic(Topic::Accessed, object_event_payload_from_record(&record, EventSource::Api))
            .await;

        Ok((data, record))
    }

    /// Presigned download URL for a single key (§4.6 "Stat / open" / "Presign
    /// download"). Emits `ObjectAccessed` (source=`presigned`).
    pub async fn presigned_download_url(&self, tenant: &str, object_key: &str, ttl: Option<Duration>) -> Result<String> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;
        let url = self.storage.presign_get(&record.bucket, object_key, ttl).await?;

        self.events
            .publish_topic(Topic::Accessed, object_event_payload_from_record(&record, EventSource::Presigned))
            .await;

        Ok(url)
    }

    /// `presign-get(keys[], expiry_seconds?)` (§4.6): one URL per key,
    /// best-effort per item.
    pub async fn presign_download_batch(
        &self,
        tenant: &str,
        object_keys: Vec<String>,
        ttl: Option<Duration>,
    ) -> BatchResult<String> {
        let mut results = Vec::with_capacity(object_keys.len());
        for key in object_keys {
            match self.presigned_download_url(tenant, &key, ttl).await {
                Ok(url) => results.push(ItemResult::ok(key, url)),
                Err(e) => results.push(ItemResult::err(key, e)),
            }
        }
        BatchResult::from_results(results)
    }

    pub async fn metadata(&self, tenant: &str, object_key: &str) -> Result<FileRecord> {
        require_tenant_prefix(tenant, object_key)?;
        self.repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))
    }

    /// §4.6 "Update metadata": S3-side `copy-to-self` with
    /// `ReplaceMetadata=true` is the authoritative half — success here is
    /// what counts. The DB upsert is best-effort: a failure is logged and
    /// the in-memory patched record is returned anyway, rather than failing
    /// an operation whose object-store half already succeeded.
    pub async fn update_metadata(&self, tenant: &str, object_key: &str, patch: FilePatch) -> Result<FileRecord> {
        require_tenant_prefix(tenant, object_key)?;
        if patch.is_empty() {
            return self.metadata(tenant, object_key).await;
        }

        let existing = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;

        let content_type = patch.content_type.as_deref().unwrap_or(&existing.content_type);
        let object_meta = self.storage.copy_to_self(&existing.bucket, object_key, Some(content_type)).await?;

        let mut db_patch = patch;
        db_patch.etag = db_patch.etag.or_else(|| object_meta.etag.clone());
        db_patch.size = db_patch.size.or(Some(object_meta.size as i64));
        db_patch.last_modified = db_patch.last_modified.or(object_meta.last_modified);

        let record = match self.repo.upsert(tenant, object_key, &existing, &db_patch).await {
            Ok(r) => r,
            Err(e) => {
                warn!(tenant, object_key, error = %e, "metadata DB upsert failed after successful S3 replace");
                apply_patch_in_memory(&existing, &db_patch)
            }
        };

        self.events
            .publish_topic(Topic::Updated, object_event_payload(&record, &object_meta, EventSource::Api))
            .await;

        Ok(record)
    }

    /// §4.6 "Copy / Move" — Copy: `copy-object`; emits `ObjectMoved` then
    /// `ObjectStored(reason=move)`. The source is left untouched.
    pub async fn copy(&self, tenant: &str, src_key: &str, dst_key: &str) -> Result<FileRecord> {
        require_tenant_prefix(tenant, src_key)?;
        require_tenant_prefix(tenant, dst_key)?;

        let record = self
            .repo
            .find_by_key(tenant, src_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {src_key}")))?;

        self.storage.copy(&record.bucket, src_key, dst_key).await?;
        let object_meta = self.storage.stat(&record.bucket, dst_key, None).await?;

        let mut copied = record.clone();
        copied.object_key = dst_key.to_string();
        copied.updated_at = Utc::now();
        let patch = FilePatch {
            size: Some(object_meta.size as i64),
            etag: object_meta.etag.clone(),
            version_id: object_meta.version_id.clone(),
            last_modified: object_meta.last_modified,
            ..Default::default()
        };
        let stored = self.repo.upsert(tenant, dst_key, &copied, &patch).await?;

        self.events
            .publish_topic(Topic::Moved, object_event_payload(&stored, &object_meta, EventSource::Move))
            .await;
        self.events
            .publish_topic(Topic::Stored, object_event_payload(&stored, &object_meta, EventSource::Move))
            .await;

        Ok(stored)
    }

    /// §4.6 Move: copy then remove the source. A remove failure retains the
    /// destination and reports a partial-success warning rather than failing
    /// the whole operation, since the copy already succeeded.
    pub async fn move_object(&self, tenant: &str, src_key: &str, dst_key: &str) -> Result<MoveOutcome> {
        require_tenant_prefix(tenant, src_key)?;
        require_tenant_prefix(tenant, dst_key)?;

        let record = self
            .repo
            .find_by_key(tenant, src_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {src_key}")))?;

        self.storage.copy(&record.bucket, src_key, dst_key).await?;
        let object_meta = self.storage.stat(&record.bucket, dst_key, None).await?;

        let mut moved = record.clone();
        moved.object_key = dst_key.to_string();
        moved.updated_at = Utc::now();
        let patch = FilePatch {
            size: Some(object_meta.size as i64),
            etag: object_meta.etag.clone(),
            version_id: object_meta.version_id.clone(),
            last_modified: object_meta.last_modified,
            ..Default::default()
        };
        let stored = self.repo.upsert(tenant, dst_key, &moved, &patch).await?;

        let warning = match self.storage.remove(&record.bucket, src_key).await {
            Ok(()) => {
                if let Err(e) = self.repo.hard_delete(tenant, src_key).await {
                    warn!(tenant, src_key, error = %e, "failed to drop source row after move");
                }
                None
            }
            Err(e) => Some(format!("copy succeeded but failed to remove source: {e}")),
        };

        self.events
            .publish_topic(Topic::Moved, object_event_payload(&stored, &object_meta, EventSource::Move))
            .await;

        Ok(MoveOutcome { record: stored, warning })
    }

    /// Soft-delete (§4.6 "Delete"): ownership check, then `remove-object` in
    /// S3, then `soft-delete` in C2, then emit `ObjectDeleted`, then collect
    /// for post-processing share invalidation through C5. The object is
    /// gone from the store the moment this returns — a trashed record has no
    /// bytes behind it; restore only clears `deleted_at`. An S3 failure fails
    /// the whole call before anything is touched in the DB; a DB failure
    /// after a successful S3 removal is surfaced but is not rolled back (§7).
    pub async fn delete(&self, tenant: &str, object_key: &str) -> Result<()> {
        self.delete_without_cascade(tenant, object_key).await?;
        if let Err(e) = self.shares.invalidate_for_object_keys(tenant, std::slice::from_ref(&object_key.to_string())).await
        {
            warn!(tenant, object_key, error = %e, "failed to invalidate shares after delete");
        }
        Ok(())
    }

    /// Batch delete (§4.6/§7 "batch operations never short-circuit"): each
    /// key is attempted independently; a failure on one does not prevent the
    /// others from being attempted. Share invalidation runs once, after the
    /// loop, across every key that was actually deleted.
    pub async fn delete_batch(&self, tenant: &str, object_keys: Vec<String>) -> BatchResult<()> {
        let mut results = Vec::with_capacity(object_keys.len());
        let mut deleted_keys = Vec::new();

        for key in object_keys {
            match self.delete_without_cascade(tenant, &key).await {
                Ok(()) => {
                    results.push(ItemResult::ok(key.clone(), ()));
                    deleted_keys.push(key);
                }
                Err(e) => results.push(ItemResult::err(key, e)),
            }
        }

        if !deleted_keys.is_empty() {
            if let Err(e) = self.shares.invalidate_for_object_keys(tenant, &deleted_keys).await {
                warn!(tenant, error = %e, "failed to invalidate shares after batch delete");
            }
        }

        BatchResult::from_results(results)
    }

    /// The non-cascading half of [`Self::delete`], reused by
    /// [`Self::delete_batch`] so invalidation can be batched once at the end
    /// instead of once per item.
    async fn delete_without_cascade(&self, tenant: &str, object_key: &str) -> Result<()> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;

        self.storage.remove(&record.bucket, object_key).await?;
        self.repo.soft_delete(tenant, object_key).await?;

        self.events
            .publish_topic(Topic::Deleted, object_event_payload_from_record(&record, EventSource::Api))
            .await;

        Ok(())
    }

    pub async fn list_by_month(&self, tenant: &str, year: i32, month: u32) -> Result<Vec<FileRecord>> {
        self.repo.list_by_month(tenant, year, month).await
    }

    /// §6 `POST /files/search`.
    pub async fn search(&self, tenant: &str, query: &str, params: PageParams) -> Result<Page<FileRecord>> {
        self.repo.search(tenant, query, params).await
    }

    // ---------------------------------------------------------------
    // Versions (§4.6 "Versions")
    // ---------------------------------------------------------------

    pub async fn list_versions(&self, tenant: &str, object_key: &str, scope: VersionScope) -> Result<Vec<VersionEntry>> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;

        match scope {
            VersionScope::Current => Ok(vec![VersionEntry {
                version_id: record.version_id.clone().unwrap_or_default(),
                etag: Some(record.etag.clone()),
                size: record.size.max(0) as u64,
                last_modified: Some(record.last_modified),
                is_latest: true,
            }]),
            VersionScope::All => {
                let metas = self.storage.list_versions(&record.bucket, object_key).await?;
                let mut entries: Vec<VersionEntry> = metas
                    .into_iter()
                    .filter(|m| m.version_id.is_some())
                    .map(|m| VersionEntry {
                        version_id: m.version_id.clone().unwrap_or_default(),
                        etag: m.etag.clone(),
                        size: m.size,
                        last_modified: m.last_modified,
                        is_latest: false,
                    })
                    .collect();
                if let Some(latest) = entries.iter_mut().max_by_key(|e| e.last_modified) {
                    latest.is_latest = true;
                }
                Ok(entries)
            }
        }
    }

    pub async fn create_version(&self, tenant: &str, object_key: &str, base_version: Option<String>) -> Result<FileRecord> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;

        let object_meta = match base_version {
            Some(v) => self.storage.copy_from_version(&record.bucket, object_key, &v).await?,
            None => self.storage.copy_to_self(&record.bucket, object_key, Some(&record.content_type)).await?,
        };

        let patch = FilePatch {
            size: Some(object_meta.size as i64),
            etag: object_meta.etag.clone(),
            version_id: object_meta.version_id.clone(),
            last_modified: object_meta.last_modified,
            ..Default::default()
        };
        let updated = self.repo.upsert(tenant, object_key, &record, &patch).await?;

        self.events
            .publish_topic(Topic::Versioned, object_event_payload(&updated, &object_meta, EventSource::Api))
            .await;

        Ok(updated)
    }

    pub async fn delete_version(&self, tenant: &str, object_key: &str, version_id: &str) -> Result<()> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;
        self.storage.remove_version(&record.bucket, object_key, version_id).await
    }

    /// Restores `version_id` to the head (§4.6 "the restored version becomes
    /// the new head"). §9(a): tests must assert restored *content*, not
    /// *etag* — some backends re-hash on copy.
    pub async fn restore_version(&self, tenant: &str, object_key: &str, version_id: &str) -> Result<FileRecord> {
        require_tenant_prefix(tenant, object_key)?;
        let record = self
            .repo
            .find_by_key(tenant, object_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file not found: {object_key}")))?;

        let object_meta = self.storage.copy_from_version(&record.bucket, object_key, version_id).await?;
        let patch = FilePatch {
            size: Some(object_meta.size as i64),
            etag: object_meta.etag.clone(),
            version_id: object_meta.version_id.clone(),
            last_modified: object_meta.last_modified,
            ..Default::default()
        };
        let updated = self.repo.upsert(tenant, object_key, &record, &patch).await?;

        self.events
            .publish_topic(Topic::Restored, object_event_payload(&updated, &object_meta, EventSource::Api))
            .await;

        Ok(updated)
    }

    // ---------------------------------------------------------------
    // Folder operations (§4.6 "Folder operations")
    // ---------------------------------------------------------------

    pub async fn create_folder(&self, tenant: &str, bucket: &str, path: &str) -> Result<FileRecord> {
        let key = folder_marker_key(tenant, path);
        require_tenant_prefix(tenant, &key)?;

        self.storage.put(bucket, &key, Vec::new(), Some("application/x-directory")).await?;

        let now = Utc::now();
        let file_name = path.trim_matches('/').rsplit('/').next().unwrap_or_default().to_string();
        let initial = FileRecord {
            id: String::new(),
            tenant: tenant.to_string(),
            object_key: key.clone(),
            file_name,
            size: 0,
            etag: String::new(),
            content_type: "application/x-directory".to_string(),
            category: String::new(),
            description: String::new(),
            tags: Vec::new(),
            bucket: bucket.to_string(),
            version_id: None,
            storage_class: "STANDARD".to_string(),
            last_modified: now,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.repo.upsert(tenant, &key, &initial, &FilePatch::default()).await
    }

    /// Recursive rename: walks objects under the old prefix, copies each to
    /// the rewritten key, removes the original. Partial failures are logged
    /// and skipped rather than aborting the whole rename (§4.6).
    pub async fn rename_folder(&self, tenant: &str, old_path: &str, new_path: &str) -> Result<BatchResult<()>> {
        let old_prefix = folder_marker_key(tenant, old_path);
        let new_prefix = folder_marker_key(tenant, new_path);
        require_tenant_prefix(tenant, &old_prefix)?;
        require_tenant_prefix(tenant, &new_prefix)?;

        let bucket = self.storage.default_bucket_name().to_string();
        let entries = self.storage.list(&bucket, &old_prefix, true).await?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_dir {
                continue;
            }
            let suffix = entry.object_key.strip_prefix(&old_prefix).unwrap_or(&entry.object_key);
            let new_key = format!("{new_prefix}{suffix}");
            match self.rename_one(tenant, &bucket, &entry.object_key, &new_key).await {
                Ok(()) => results.push(ItemResult::ok(entry.object_key, ())),
                Err(e) => {
                    warn!(tenant, src = %entry.object_key, error = %e, "folder rename failed for object");
                    results.push(ItemResult::err(entry.object_key, e));
                }
            }
        }
        Ok(BatchResult::from_results(results))
    }

    async fn rename_one(&self, tenant: &str, bucket: &str, src_key: &str, dst_key: &str) -> Result<()> {
        self.storage.copy(bucket, src_key, dst_key).await?;
        self.storage.remove(bucket, src_key).await?;

        if let Some(mut record) = self.repo.find_by_key(tenant, src_key).await? {
            record.object_key = dst_key.to_string();
            record.updated_at = Utc::now();
            self.repo.upsert(tenant, dst_key, &record, &FilePatch::default()).await?;
            self.repo.hard_delete(tenant, src_key).await?;
        }
        Ok(())
    }

    /// §4.6 "Delete requires `recursive=true` when the folder is non-empty
    /// (> 1 marker object)" — the marker itself counts toward the deleted
    /// total (§9(c)).
    pub async fn delete_folder(&self, tenant: &str, path: &str, recursive: bool) -> Result<u64> {
        let prefix = folder_marker_key(tenant, path);
        require_tenant_prefix(tenant, &prefix)?;

        let record = self.repo.find_any_by_key(tenant, &prefix).await?;
        let bucket = record.map_or_else(|| self.storage.default_bucket_name().to_string(), |r| r.bucket);

        let entries = self.storage.list(&bucket, &prefix, true).await?;
        let objects: Vec<_> = entries.into_iter().filter(|e| !e.is_dir).collect();

        if objects.len() > 1 && !recursive {
            return Err(Error::Conflict("FolderNotEmpty".to_string()));
        }

        let mut deleted = 0u64;
        for entry in objects {
            match self.delete_without_cascade(tenant, &entry.object_key).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(tenant, object_key = %entry.object_key, error = %e, "folder delete failed for object"),
            }
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------
    // Re-sync (§4.6 "Re-sync", §4.9 jobs #2/#3)
    // ---------------------------------------------------------------

    /// `sync-objects-to-db(tenant[, year[, month[, day]]])`: one-way,
    /// object-store-authoritative repair. Missing DB rows are created; rows
    /// whose object no longer exists are **not** removed.
    pub async fn sync_tenant(
        &self,
        tenant: &str,
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
    ) -> Result<BatchResult<()>> {
        let bucket = self.storage.default_bucket_name().to_string();
        let mut prefix = format!("{tenant}/");
        if let Some(y) = year {
            prefix.push_str(&format!("{y:04}/"));
            if let Some(m) = month {
                prefix.push_str(&format!("{m:02}/"));
                if let Some(d) = day {
                    prefix.push_str(&format!("{d:02}/"));
                }
            }
        }

        let entries = self.storage.list(&bucket, &prefix, true).await?;
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_dir || entry.object_key.ends_with('/') {
                continue;
            }
            match self.sync_one(tenant, &bucket, &entry.object_key).await {
                Ok(()) => results.push(ItemResult::ok(entry.object_key, ())),
                Err(e) => {
                    warn!(tenant, object_key = %entry.object_key, error = %e, "resync failed for object");
                    results.push(ItemResult::err(entry.object_key, e));
                }
            }
        }
        Ok(BatchResult::from_results(results))
    }

    async fn sync_one(&self, tenant: &str, bucket: &str, object_key: &str) -> Result<()> {
        let meta = self.storage.stat(bucket, object_key, None).await?;
        let now = Utc::now();
        let initial = FileRecord {
            id: String::new(),
            tenant: tenant.to_string(),
            object_key: object_key.to_string(),
            file_name: object_key.rsplit('/').next().unwrap_or(object_key).to_string(),
            size: meta.size as i64,
            etag: meta.etag.clone().unwrap_or_default(),
            content_type: meta.content_type.clone().unwrap_or_default(),
            category: String::new(),
            description: String::new(),
            tags: Vec::new(),
            bucket: bucket.to_string(),
            version_id: meta.version_id.clone(),
            storage_class: "STANDARD".to_string(),
            last_modified: meta.last_modified.unwrap_or(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let patch = FilePatch {
            size: Some(meta.size as i64),
            etag: meta.etag.clone(),
            content_type: meta.content_type.clone(),
            version_id: meta.version_id.clone(),
            last_modified: meta.last_modified,
            ..Default::default()
        };
        self.repo.upsert(tenant, object_key, &initial, &patch).await?;
        Ok(())
    }
}

/// Applies only the fields a patch explicitly sets, mirroring
/// `FileRepository::upsert`'s merge semantics, for the best-effort in-memory
/// fallback when the DB half of `update_metadata` fails.
fn apply_patch_in_memory(existing: &FileRecord, patch: &FilePatch) -> FileRecord {
    let mut record = existing.clone();
    if let Some(v) = &patch.file_name {
        record.file_name = v.clone();
    }
    if let Some(v) = patch.size {
        record.size = v;
    }
    if let Some(v) = &patch.etag {
        record.etag = v.clone();
    }
    if let Some(v) = &patch.content_type {
        record.content_type = v.clone();
    }
    if let Some(v) = &patch.category {
        record.category = v.clone();
    }
    if let Some(v) = &patch.description {
        record.description = v.clone();
    }
    if let Some(v) = &patch.tags {
        record.tags = v.clone();
    }
    if let Some(v) = patch.last_modified {
        record.last_modified = v;
    }
    record.updated_at = Utc::now();
    record
}

fn object_event_payload(record: &FileRecord, meta: &ObjectMeta, source: EventSource) -> ObjectEventPayload {
    ObjectEventPayload {
        bucket: record.bucket.clone(),
        object_key: record.object_key.clone(),
        version_id: meta.version_id.clone(),
        etag: meta.etag.clone(),
        size: Some(meta.size as i64),
        content_type: meta.content_type.clone(),
        file_name: Some(record.file_name.clone()),
        source,
        occurred_at: Utc::now(),
    }
}

fn object_event_payload_from_record(record: &FileRecord, source: EventSource) -> ObjectEventPayload {
    ObjectEventPayload {
        bucket: record.bucket.clone(),
        object_key: record.object_key.clone(),
        version_id: record.version_id.clone(),
        etag: Some(record.etag.clone()),
        size: Some(record.size),
        content_type: Some(record.content_type.clone()),
        file_name: Some(record.file_name.clone()),
        source,
        occurred_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_prefix_is_enforced() {
        assert!(require_tenant_prefix("u1", "u1/a.md").is_ok());
        assert!(matches!(require_tenant_prefix("u1", "other/a.md"), Err(Error::Forbidden(_))));
    }

    #[test]
    fn tenant_prefix_rejects_substring_match() {
        // "other-tenant/foo".contains("tenant") is true but must still fail.
        assert!(matches!(require_tenant_prefix("tenant", "other-tenant/foo"), Err(Error::Forbidden(_))));
    }

    #[test]
    fn build_upload_key_matches_object_key_format() {
        let now = DateTime::parse_from_rfc3339("2025-09-03T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(build_upload_key("u1", "a.md", now), "u1/2025/09/a.md");
    }

    #[test]
    fn folder_id_is_deterministic() {
        assert_eq!(folder_id("u1", "notes"), folder_id("u1", "notes"));
        assert_ne!(folder_id("u1", "notes"), folder_id("u1", "other"));
    }
}
