//! Per-component liveness (§6 `/health/{db,s3,mq}`): each endpoint probes
//! exactly one backend and reports 200/503 on its own, rather than the
//! single aggregate readiness check `StorageManager::health()` offers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
struct ComponentHealth {
    component: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn ok(component: &'static str) -> Response {
        (StatusCode::OK, Json(Self { component, status: "ok", error: None })).into_response()
    }

    fn unavailable(component: &'static str, error: notevault_core::Error) -> Response {
        let body = Self { component, status: "unavailable", error: Some(error.to_string()) };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

async fn health_db(State(state): State<AppState>) -> Response {
    match state.manager.health_db().await {
        Ok(()) => ComponentHealth::ok("db"),
        Err(e) => ComponentHealth::unavailable("db", e),
    }
}

async fn health_s3(State(state): State<AppState>) -> Response {
    match state.manager.health_s3().await {
        Ok(()) => ComponentHealth::ok("s3"),
        Err(e) => ComponentHealth::unavailable("s3", e),
    }
}

async fn health_mq(State(state): State<AppState>) -> Response {
    match state.manager.health_mq().await {
        Ok(()) => ComponentHealth::ok("mq"),
        Err(e) => ComponentHealth::unavailable("mq", e),
    }
}

async fn metrics() -> Response {
    match notevault_core::metrics::render() {
        Ok(body) => (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/db", get(health_db))
        .route("/health/s3", get(health_s3))
        .route("/health/mq", get(health_mq))
        .route("/metrics", get(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_reports_200() {
        let response = ComponentHealth::ok("db");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn unavailable_reports_503() {
        let response = ComponentHealth::unavailable("s3", notevault_core::Error::StorageUnavailable("down".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
