//! Metadata operations (§6 `/meta/*`): read/update/clear a single file's
//! metadata, batch reads, and the tenant resync job.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use notevault_core::models::{BatchResult, FilePatch, ItemResult};
use serde::Deserialize;

use super::{AppResult, AppState, Identity};

fn decode_key(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

async fn get_meta(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let record = state.manager.files.metadata(&tenant, &object_key).await?;
    Ok(Json(record).into_response())
}

async fn update_meta(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
    Json(patch): Json<FilePatch>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let record = state.manager.files.update_metadata(&tenant, &object_key, patch).await?;
    Ok(Json(record).into_response())
}

/// There is no distinct "clear metadata" operation in the orchestration
/// core; clearing is modeled as an update with every field reset to empty,
/// same as any other patch.
async fn clear_meta(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let patch = FilePatch {
        description: Some(String::new()),
        tags: Some(Vec::new()),
        category: Some(String::new()),
        ..Default::default()
    };
    let record = state.manager.files.update_metadata(&tenant, &object_key, patch).await?;
    Ok(Json(record).into_response())
}

#[derive(Deserialize)]
pub struct UrlQuery {
    expiry_seconds: Option<u64>,
}

async fn meta_url(
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
pub struct MetaBatchRequest {
    object_keys: Vec<String>,
}

async fn meta_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<MetaBatchRequest>,
) -> AppResult<Response> {
    let mut results = Vec::with_capacity(req.object_keys.len());
    for key in req.object_keys {
        match state.manager.files.metadata(&tenant, &key).await {
            Ok(record) => results.push(ItemResult::ok(key, record)),
            Err(e) => results.push(ItemResult::err(key, e)),
        }
    }
    Ok(Json(BatchResult::from_results(results)).into_response())
}

#[derive(Deserialize)]
pub struct SyncQuery {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

async fn sync(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Query(query): Query<SyncQuery>,
) -> AppResult<Response> {
    let result = state.manager.files.sync_tenant(&tenant, query.year, query.month, query.day).await?;
    Ok(Json(result).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meta/batch", post(meta_batch))
        .route("/meta/sync", post(sync))
        .route("/meta/{object_key}", get(get_meta).post(update_meta).put(update_meta).delete(clear_meta))
        .route("/meta/{object_key}/url", get(meta_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_key_reverses_percent_encoding() {
        assert_eq!(decode_key("acme%2F2026%2F08%2Fnotes.txt"), "acme/2026/08/notes.txt");
    }
}
