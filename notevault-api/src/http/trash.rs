//! Trash operations (§6 `/trash/*`): list, restore, permanent delete, and
//! the manual trigger for auto-clean.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use notevault_core::models::PageParams;
use serde::Deserialize;

use super::{AppResult, AppState, Identity};

fn decode_key(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[derive(Deserialize)]
pub struct ListQuery {
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list(State(state): State<AppState>, Identity(tenant): Identity, Query(query): Query<ListQuery>) -> AppResult<Response> {
    let params = PageParams::new(query.page, query.page_size);
    let page = state.manager.trash.list(&tenant, params).await?;
    Ok(Json(page).into_response())
}

async fn restore_one(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let restored = state.manager.trash.restore(&tenant, std::slice::from_ref(&object_key)).await?;
    Ok(Json(serde_json::json!({ "restored": restored })).into_response())
}

async fn delete_one(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Path(object_key): Path<String>,
) -> AppResult<Response> {
    let object_key = decode_key(&object_key);
    let deleted = state.manager.trash.delete_permanently(&tenant, std::slice::from_ref(&object_key)).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}

#[derive(Deserialize)]
pub struct KeysRequest {
    object_keys: Vec<String>,
}

async fn restore_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<KeysRequest>,
) -> AppResult<Response> {
    let restored = state.manager.trash.restore(&tenant, &req.object_keys).await?;
    Ok(Json(serde_json::json!({ "restored": restored })).into_response())
}

async fn delete_batch(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<KeysRequest>,
) -> AppResult<Response> {
    let deleted = state.manager.trash.delete_permanently(&tenant, &req.object_keys).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}

async fn empty(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    let deleted = state.manager.trash.empty(&tenant).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}

#[derive(Deserialize)]
pub struct AutoCleanRequest {
    before: Option<chrono::DateTime<Utc>>,
    days: Option<i64>,
}

const DEFAULT_AUTOCLEAN_DAYS: i64 = 30;

fn resolve_cutoff(req: &AutoCleanRequest, now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    req.before.unwrap_or_else(|| now - chrono::Duration::days(req.days.unwrap_or(DEFAULT_AUTOCLEAN_DAYS)))
}

async fn auto_clean(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Json(req): Json<AutoCleanRequest>,
) -> AppResult<Response> {
    let before = resolve_cutoff(&req, Utc::now());
    let cleaned = state.manager.trash.auto_clean(&tenant, before).await?;
    Ok(Json(serde_json::json!({ "cleaned": cleaned })).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trash", get(list).delete(empty))
        .route("/trash/batch/restore", post(restore_batch))
        .route("/trash/batch", delete(delete_batch))
        .route("/trash/auto-clean", post(auto_clean))
        .route("/trash/{object_key}/restore", post(restore_one))
        .route("/trash/{object_key}", delete(delete_one))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_key_reverses_percent_encoding() {
        assert_eq!(decode_key("acme%2F2026%2F08%2Ffile.bin"), "acme/2026/08/file.bin");
    }

    #[test]
    fn resolve_cutoff_prefers_explicit_before() {
        let now = Utc::now();
        let explicit = now - chrono::Duration::days(5);
        let req = AutoCleanRequest { before: Some(explicit), days: Some(1) };
        assert_eq!(resolve_cutoff(&req, now), explicit);
    }

    #[test]
    fn resolve_cutoff_falls_back_to_days_then_default() {
        let now = Utc::now();

        let req = AutoCleanRequest { before: None, days: Some(7) };
        assert_eq!(resolve_cutoff(&req, now), now - chrono::Duration::days(7));

        let req = AutoCleanRequest { before: None, days: None };
        assert_eq!(resolve_cutoff(&req, now), now - chrono::Duration::days(DEFAULT_AUTOCLEAN_DAYS));
    }
}
