//! Stats operations (§6 `/stats/*`): usage figures computed on demand from
//! the metadata repository, plus two aggregate views (dashboard, report)
//! the orchestration core itself doesn't bundle — they're just several
//! calls merged into one JSON body here at the boundary.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{AppResult, AppState, Identity};

const DEFAULT_TREND_DAYS: i64 = 14;
const DASHBOARD_TREND_DAYS: i64 = 7;
const REPORT_TREND_DAYS: i64 = 30;

async fn files(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.tenant_stats(&tenant).await?).into_response())
}

async fn by_type(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.by_content_type(&tenant).await?).into_response())
}

async fn by_size(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.by_size_bucket(&tenant).await?).into_response())
}

#[derive(Deserialize)]
pub struct TrendQuery {
    days: Option<i64>,
}

async fn trend(State(state): State<AppState>, Identity(tenant): Identity, Query(query): Query<TrendQuery>) -> AppResult<Response> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    Ok(Json(state.manager.stats.trend(&tenant, days).await?).into_response())
}

async fn storage(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.storage_summary(&tenant).await?).into_response())
}

async fn by_bucket(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.by_bucket(&tenant).await?).into_response())
}

#[derive(Deserialize)]
pub struct UploadsQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn uploads(State(state): State<AppState>, Identity(tenant): Identity, Query(query): Query<UploadsQuery>) -> AppResult<Response> {
    let today = Utc::now().date_naive();
    let (from, to) = (query.from.unwrap_or(today), query.to.unwrap_or(today));
    let point = state.manager.stats.uploads_range(&tenant, from, to).await?;
    Ok(Json(point).into_response())
}

#[derive(Deserialize)]
pub struct DailyQuery {
    day: Option<NaiveDate>,
}

async fn uploads_daily(
    State(state): State<AppState>,
    Identity(tenant): Identity,
    Query(query): Query<DailyQuery>,
) -> AppResult<Response> {
    let day = query.day.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.manager.stats.uploads_daily(&tenant, day).await?).into_response())
}

/// Every tenant's totals, not just the caller's — this mirrors what the
/// scheduler's cross-tenant jobs already see, useful for an operator view.
/// Still requires a valid identity even though the tenant isn't used to
/// scope the query, so this doesn't become an unauthenticated endpoint.
async fn uploads_by_user(State(state): State<AppState>, Identity(_caller): Identity) -> AppResult<Response> {
    Ok(Json(state.manager.stats.stats_by_user().await?).into_response())
}

async fn dashboard(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    let storage = state.manager.stats.storage_summary(&tenant).await?;
    let by_type = state.manager.stats.by_content_type(&tenant).await?;
    let trend = state.manager.stats.trend(&tenant, DASHBOARD_TREND_DAYS).await?;
    Ok(Json(serde_json::json!({
        "storage": storage,
        "by_content_type": by_type,
        "trend": trend,
    }))
    .into_response())
}

async fn report(State(state): State<AppState>, Identity(tenant): Identity) -> AppResult<Response> {
    let storage = state.manager.stats.storage_summary(&tenant).await?;
    let by_bucket = state.manager.stats.by_bucket(&tenant).await?;
    let by_size = state.manager.stats.by_size_bucket(&tenant).await?;
    let by_type = state.manager.stats.by_content_type(&tenant).await?;
    let trend = state.manager.stats.trend(&tenant, REPORT_TREND_DAYS).await?;
    Ok(Json(serde_json::json!({
        "storage": storage,
        "by_bucket": by_bucket,
        "by_size": by_size,
        "by_content_type": by_type,
        "trend": trend,
    }))
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats/files", get(files))
        .route("/stats/files/type", get(by_type))
        .route("/stats/files/size", get(by_size))
        .route("/stats/files/trend", get(trend))
        .route("/stats/storage", get(storage))
        .route("/stats/storage/bucket", get(by_bucket))
        .route("/stats/uploads", get(uploads))
        .route("/stats/uploads/daily", get(uploads_daily))
        .route("/stats/uploads/user", get(uploads_by_user))
        .route("/stats/dashboard", get(dashboard))
        .route("/stats/report", get(report))
}
