//! HTTP boundary: route registration, shared state, and the global
//! middleware stack. Handlers live one module per resource group, mirroring
//! the orchestration core's own module boundaries (files, meta, trash,
//! shares, stats, health) rather than a flat list of routes.

pub mod error;
pub mod files;
pub mod health;
mod identity;
pub mod meta;
pub mod shares;
pub mod stats;
pub mod trash;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use notevault_core::{Config, StorageManager};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};
pub use identity::Identity;

const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<StorageManager>,
    pub config: Arc<Config>,
}

/// Assembles the full router: per-resource route groups merged together,
/// then the global middleware stack applied once around the whole thing.
#[must_use]
pub fn build_router(manager: Arc<StorageManager>, config: Arc<Config>) -> Router {
    let state = AppState { manager, config: config.clone() };

    let router = Router::new()
        .merge(health::router())
        .merge(files::router())
        .merge(meta::router())
        .merge(trash::router())
        .merge(shares::router())
        .merge(stats::router())
        .with_state(state);

    apply_global_layers(router, &config)
}

fn apply_global_layers(router: Router, config: &Config) -> Router {
    router
        .layer(build_cors_layer(config))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

/// Permissive CORS in development, deny-all (with a startup warning) in
/// every other mode. There is no configurable origin allow-list; adding one
/// would introduce config surface nothing else in this crate needs yet.
fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.server.development_mode {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        tracing::warn!(
            "development_mode is disabled and no CORS origin allow-list is configured; \
             denying all cross-origin requests"
        );
        CorsLayer::new()
    }
}
