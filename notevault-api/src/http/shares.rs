//! Share operations (§6 `/shares/*`): create/list/revoke grants, anonymous
//! access and single-object download, and owner-only permission management.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use notevault_core::models::{CreateShareRequest, ShareId, SharePermissions, UpdateSharePermissionsRequest};
use serde::Deserialize;

use super::{AppError, AppResult, AppState, Identity};

async fn create(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Json(req): Json<CreateShareRequest>,
) -> AppResult<Response> {
    let info = state.manager.shares.create(&owner, req).await?;
    Ok(Json(info).into_response())
}

async fn list_owned(State(state): State<AppState>, Identity(owner): Identity) -> AppResult<Response> {
    let shares = state.manager.shares.list_owned(&owner).await?;
    Ok(Json(shares).into_response())
}

#[derive(Deserialize)]
pub struct AccessQuery {
    password: Option<String>,
}

async fn access(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state.manager.shares.access(&share_id, query.password.as_deref()).await?;
    Ok(Json(info).into_response())
}

#[derive(Deserialize)]
pub struct AccessRequest {
    password: Option<String>,
}

async fn access_post(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    Json(req): Json<AccessRequest>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state.manager.shares.access(&share_id, req.password.as_deref()).await?;
    Ok(Json(info).into_response())
}

async fn download(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state.manager.shares.access(&share_id, query.password.as_deref()).await?;
    let object_key = state.manager.shares.resolve_download_key(&share_id, query.password.as_deref()).await?;
    let url = state.manager.files.presigned_download_url(&info.owner, &object_key, None).await?;
    Ok(Json(serde_json::json!({ "url": url })).into_response())
}

async fn revoke(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(share_id): Path<String>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    state.manager.shares.revoke(&share_id, &caller).await?;
    Ok(Json(serde_json::json!({ "revoked": true })).into_response())
}

/// Ownership is enforced by `list_owned` filtering on the caller's own
/// grants, not by reading the grant directly — that also sidesteps the
/// password check `access()` would otherwise apply even to the owner.
async fn get_permissions(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(share_id): Path<String>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state
        .manager
        .shares
        .list_owned(&caller)
        .await?
        .into_iter()
        .find(|s| s.share_id == share_id)
        .ok_or_else(|| AppError::not_found("share not found"))?;
    Ok(Json(info.permissions).into_response())
}

fn apply_permission_patch(mut permissions: SharePermissions, req: &UpdateSharePermissionsRequest) -> SharePermissions {
    if let Some(allow_anonymous) = req.allow_anonymous {
        permissions.allow_anonymous = allow_anonymous;
    }
    permissions
}

async fn update_permissions(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(share_id): Path<String>,
    Json(req): Json<UpdateSharePermissionsRequest>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let current = state
        .manager
        .shares
        .list_owned(&caller)
        .await?
        .into_iter()
        .find(|s| s.share_id == share_id)
        .ok_or_else(|| AppError::not_found("share not found"))?;

    let permissions = apply_permission_patch(current.permissions, &req);
    let info = state.manager.shares.update_permissions(&share_id, &caller, permissions, req.allow_download).await?;
    Ok(Json(info).into_response())
}

#[derive(Deserialize)]
pub struct UserRequest {
    user: String,
}

async fn add_user(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(share_id): Path<String>,
    Json(req): Json<UserRequest>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state.manager.shares.add_user(&share_id, &caller, &req.user).await?;
    Ok(Json(info).into_response())
}

async fn remove_user(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path((share_id, user)): Path<(String, String)>,
) -> AppResult<Response> {
    let share_id = ShareId::from_string(share_id);
    let info = state.manager.shares.remove_user(&share_id, &caller, &user).await?;
    Ok(Json(info).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shares", post(create).get(list_owned))
        .route("/shares/{share_id}", get(access).delete(revoke))
        .route("/shares/{share_id}/access", post(access_post))
        .route("/shares/{share_id}/download", get(download))
        .route("/shares/{share_id}/permissions", get(get_permissions).put(update_permissions))
        .route("/shares/{share_id}/permissions/users", post(add_user))
        .route("/shares/{share_id}/permissions/users/{user}", axum::routing::delete(remove_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_flips_allow_anonymous_when_set() {
        let current = SharePermissions::default();
        let req = UpdateSharePermissionsRequest { allow_anonymous: Some(true), allow_download: None };
        let patched = apply_permission_patch(current, &req);
        assert!(patched.allow_anonymous);
    }

    #[test]
    fn patch_leaves_allow_anonymous_untouched_when_absent() {
        let mut current = SharePermissions::default();
        current.allow_anonymous = true;
        let req = UpdateSharePermissionsRequest { allow_anonymous: None, allow_download: Some(false) };
        let patched = apply_permission_patch(current, &req);
        assert!(patched.allow_anonymous);
    }
}
