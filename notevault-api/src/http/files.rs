//! File operations (§6 `/files/*`): presigned and direct uploads, downloads,
//! copy/move/delete, listing, search, folders, and version history.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use notevault_core::models::{FileRecord, Page, PageParams, UploadItem, VersionEntry};
use notevault_core::service::files::VersionScope;
use serde::{Deserialize, Serialize};

use super::{AppError, AppResult, AppState, Identity};

fn decode_key(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[derive(Deserialize)]
pub struct PresignRequest {
    file_name: String,
    bucket: Option<String>,
    expiry_seconds: Option<u64>,
    max_size_bytes: Option<u64>,
}

#[derive(Deserialize)]
pub struct PresignBatchRequest {
    file_names: Vec<String>,
    bucket: Option<String>,
    expiry_seconds: Option<u64>,
    max_size_bytes: Option<u64>,
}

const DEFAULT_POST_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;

async fn presign_put(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<PresignRequest>,
) -> AppResult<Response> {
    let bucket = req.bucket.as_deref().unwrap_or(state.manager.storage.default_bucket_name());
    let ttl = req.expiry_seconds.map(Duration::from_secs);
    let result = state.manager.files.presign_upload_put(&tenant, bucket, &req.file_name, ttl).await?;
    Ok(Json(result).into_response())
}

async fn presign_post(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<PresignRequest>,
) -> AppResult<Response> {
    let bucket = req.bucket.as_deref().unwrap_or(state.manager.storage.default_bucket_name());
    let ttl = req.expiry_seconds.map(Duration::from_secs);
    let max_size = req.max_size_bytes.unwrap_or(DEFAULT_POST_MAX_SIZE_BYTES);
    let result = state.manager.files.presign_upload_post(&tenant, bucket, &req.file_name, ttl, max_size).await?;
    Ok(Json(result).into_response())
}

async fn presign_put_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<PresignBatchRequest>,
) -> AppResult<Response> {
    let bucket = req.bucket.as_deref().unwrap_or(state.manager.storage.default_bucket_name());
    let ttl = req.expiry_seconds.map(Duration::from_secs);
    let result = state.manager.files.presign_upload_put_batch(&tenant, bucket, req.file_names, ttl).await;
    Ok(Json(result).into_response())
}

async fn presign_post_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<PresignBatchRequest>,
) -> AppResult<Response> {
    let bucket = req.bucket.as_deref().unwrap_or(state.manager.storage.default_bucket_name());
    let ttl = req.expiry_seconds.map(Duration::from_secs);
    let max_size = req.max_size_bytes.unwrap_or(DEFAULT_POST_MAX_SIZE_BYTES);
    let result =
        state.manager.files.presign_upload_post_batch(&tenant, bucket, req.file_names, ttl, max_size).await;
    Ok(Json(result).into_response())
}

#[derive(Deserialize)]
pub struct UploadRequest {
    object_key: Option<String>,
    bucket: Option<String>,
    file_name: String,
    content_type: Option<String>,
    category: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    /// Base64-encoded file contents; there is no multipart boundary parser
    /// in this crate, so direct uploads travel as a JSON envelope instead.
    data_base64: String,
}

impl UploadRequest {
    fn decode(self, tenant: &str) -> AppResult<UploadItem> {
        let data = STANDARD.decode(&self.data_base64).map_err(|e| AppError::bad_request(e.to_string()))?;
        let object_key = self
            .object_key
            .unwrap_or_else(|| notevault_core::service::files::build_upload_key(tenant, &self.file_name, chrono::Utc::now()));
        Ok(UploadItem {
            object_key,
            bucket: self.bucket.unwrap_or_default(),
            data,
            file_name: self.file_name,
            content_type: self.content_type.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            tags: self.tags,
        })
    }
}

async fn upload(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<UploadRequest>,
) -> AppResult<Response> {
    let item = req.decode(&tenant)?;
    let bucket = if item.bucket.is_empty() { state.manager.storage.default_bucket_name().to_string() } else { item.bucket };
    let outcome = state
        .manager
        .files
        .upload(
            &tenant,
            &item.object_key,
            &bucket,
            item.data,
            &item.file_name,
            &item.content_type,
            &item.category,
            &item.description,
            item.tags,
        )
        .await?;
    Ok(Json(outcome).into_response())
}

#[derive(Deserialize)]
pub struct UploadBatchRequest {
    items: Vec<UploadRequest>,
}

async fn upload_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<UploadBatchRequest>,
) -> AppResult<Response> {
    let mut items = Vec::with_capacity(req.items.len());
    for item in req.items {
        items.push(item.decode(&tenant)?);
    }
    let result = state.manager.files.upload_batch(&tenant, items).await;
    Ok(Json(result).into_response())
}

#[derive(Serialize)]
struct DownloadPayload {
    record: FileRecord,
    data_base64: String,
}

async fn download(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let (data, record) = state.manager.files.download(&tenant, &object_key).await?;
    Ok(Json(DownloadPayload { record, data_base64: STANDARD.encode(data) }).into_response())
}

#[derive(Deserialize)]
pub struct UrlQuery {
    expiry_seconds: Option<u64>,
}

async fn download_url(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
    Query(query): Query<UrlQuery>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let ttl = query.expiry_seconds.map(Duration::from_secs);
    let url = state.manager.files.presigned_download_url(&tenant, &object_key, ttl).await?;
    Ok(Json(serde_json::json!({ "url": url })).into_response())
}

#[derive(Deserialize)]
pub struct DownloadBatchRequest {
    object_keys: Vec<String>,
    expiry_seconds: Option<u64>,
}

async fn download_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<DownloadBatchRequest>,
) -> AppResult<Response> {
    let ttl = req.expiry_seconds.map(Duration::from_secs);
    let result = state.manager.files.presign_download_batch(&tenant, req.object_keys, ttl).await;
    Ok(Json(result).into_response())
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    object_keys: Vec<String>,
}

async fn delete_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<DeleteRequest>,
) -> AppResult<Response> {
    if req.object_keys.len() == 1 {
        state.manager.files.delete(&tenant, &req.object_keys[0]).await?;
        return Ok(Json(serde_json::json!({ "deleted": 1 })).into_response());
    }
    let result = state.manager.files.delete_batch(&tenant, req.object_keys).await;
    Ok(Json(result).into_response())
}

#[derive(Deserialize)]
pub struct CopyMoveItem {
    src: String,
    dst: String,
}

#[derive(Deserialize)]
pub struct CopyMoveRequest {
    items: Vec<CopyMoveItem>,
}

async fn copy(State(state): State<AppState>, Identity(tenant): Identity, Json(req): Json<CopyMoveRequest>) -> AppResult<Response> {
    let mut results = Vec::with_capacity(req.items.len());
    for item in req.items {
        match state.manager.files.copy(&tenant, &item.src, &item.dst).await {
            Ok(record) => results.push(notevault_core::models::ItemResult::ok(item.dst, record)),
            Err(e) => results.push(notevault_core::models::ItemResult::err(item.dst, e)),
        }
    }
    Ok(Json(notevault_core::models::BatchResult::from_results(results)).into_response())
}

async fn move_objects(State(state): State<AppState>, Identity(tenant): Identity, Json(req): Json<CopyMoveRequest>) -> AppResult<Response> {
    let mut results = Vec::with_capacity(req.items.len());
    for item in req.items {
        match state.manager.files.move_object(&tenant, &item.src, &item.dst).await {
            Ok(outcome) => results.push(notevault_core::models::ItemResult::ok(item.dst, outcome)),
            Err(e) => results.push(notevault_core::models::ItemResult::err(item.dst, e)),
        }
    }
    Ok(Json(notevault_core::models::BatchResult::from_results(results)).into_response())
}

#[derive(Deserialize)]
pub struct ListQuery {
    year: i32,
    month: u32,
}

async fn list_by_month(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let records = state.manager.files.list_by_month(&tenant, query.year, query.month).await?;
    Ok(Json(records).into_response())
}

#[derive(Deserialize)]
pub struct SearchRequest {
    query: String,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn search(State(state): State<AppState>, Identity(tenant): Identity, Json(req): Json<SearchRequest>) -> AppResult<Response> {
    let params = PageParams::new(req.page, req.page_size);
    let page: Page<FileRecord> = state.manager.files.search(&tenant, &req.query, params).await?;
    Ok(Json(page).into_response())
}

#[derive(Deserialize)]
pub struct FolderRequest {
    bucket: Option<String>,
    path: String,
}

async fn create_folder(State(state): State<AppState>, Identity(tenant): Identity, Json(req): Json<FolderRequest>) -> AppResult<Response> {
    let bucket = req.bucket.as_deref().unwrap_or(state.manager.storage.default_bucket_name());
    let record = state.manager.files.create_folder(&tenant, bucket, &req.path).await?;
    Ok(Json(record).into_response())
}

#[derive(Deserialize)]
pub struct RenameFolderRequest {
    new_path: String,
}

async fn rename_folder(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(path): Path<String>,
    Json(req): Json<RenameFolderRequest>,
) -> AppResult<Response> {
    let old_path = decode_key(&path);
    let result = state.manager.files.rename_folder(&tenant, &old_path, &req.new_path).await?;
    Ok(Json(result).into_response())
}

#[derive(Deserialize)]
pub struct DeleteFolderQuery {
    #[serde(default)]
    recursive: bool,
}

async fn delete_folder(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(path): Path<String>,
    Query(query): Query<DeleteFolderQuery>,
) -> AppResult<Response> {
    let path = decode_key(&path);
    let removed = state.manager.files.delete_folder(&tenant, &path, query.recursive).await?;
    Ok(Json(serde_json::json!({ "removed": removed })).into_response())
}

#[derive(Deserialize)]
pub struct VersionsQuery {
    #[serde(default)]
    all: bool,
}

async fn list_versions(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
    Query(query): Query<VersionsQuery>,
) -> AppResult<Json<Vec<VersionEntry>>> {
    let object_key = decode_key(&object_key);
    let scope = if query.all { VersionScope::All } else { VersionScope::Current };
    let versions = state.manager.files.list_versions(&tenant, &object_key, scope).await?;
    Ok(Json(versions))
}

#[derive(Deserialize)]
pub struct CreateVersionRequest {
    base_version: Option<String>,
}

async fn create_version(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
    Json(req): Json<CreateVersionRequest>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let record = state.manager.files.create_version(&tenant, &object_key, req.base_version).await?;
    Ok(Json(record).into_response())
}

async fn delete_version(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path((object_key, version_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    state.manager.files.delete_version(&tenant, &object_key, &version_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })).into_response())
}

async fn restore_version(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path((object_key, version_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let record = state.manager.files.restore_version(&tenant, &object_key, &version_id).await?;
    Ok(Json(record).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", post(upload).delete(delete_batch))
        .route("/files/presign", post(presign_put))
        .route("/files/presign/policy", post(presign_post))
        .route("/files/presign/batch", post(presign_put_batch))
        .route("/files/presign/policy/batch", post(presign_post_batch))
        .route("/files/batch", post(upload_batch))
        .route("/files/copy", post(copy))
        .route("/files/move", post(move_objects))
        .route("/files/list", get(list_by_month))
        .route("/files/search", post(search))
        .route("/files/folder", post(create_folder))
        .route("/files/folder/{path}", put(rename_folder).delete(delete_folder))
        .route("/files/download/batch", post(download_batch))
        .route("/files/download/{object_key}", get(download))
        .route("/files/url/{object_key}", get(download_url))
        .route("/files/versions/{object_key}", get(list_versions).post(create_version))
        .route("/files/versions/{object_key}/{version_id}", delete(delete_version))
        .route("/files/versions/{object_key}/{version_id}/restore", post(restore_version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_key_reverses_percent_encoding_of_slashes() {
        assert_eq!(decode_key("acme%2F2026%2F08%2Fnotes.txt"), "acme/2026/08/notes.txt");
    }

    #[test]
    fn decode_key_passes_through_plain_keys() {
        assert_eq!(decode_key("already-plain"), "already-plain");
    }

    fn sample_upload_request(object_key: Option<String>) -> UploadRequest {
        UploadRequest {
            object_key,
            bucket: None,
            file_name: "notes.txt".to_string(),
            content_type: None,
            category: None,
            description: None,
            tags: Vec::new(),
            data_base64: STANDARD.encode(b"hello"),
        }
    }

    #[test]
    fn decode_fills_in_missing_object_key() {
        let item = sample_upload_request(None).decode("acme").unwrap();
        assert!(item.object_key.starts_with("acme/"));
        assert_eq!(item.data, b"hello");
        assert_eq!(item.bucket, "");
        assert_eq!(item.content_type, "");
    }

    #[test]
    fn decode_keeps_explicit_object_key() {
        let item = sample_upload_request(Some("acme/custom/path.txt".to_string())).decode("acme").unwrap();
        assert_eq!(item.object_key, "acme/custom/path.txt");
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let mut req = sample_upload_request(None);
        req.data_base64 = "not base64!!".to_string();
        assert!(req.decode("acme").is_err());
    }
}
