//! Share grant persistence, backing C5 (§4.5). Cache population lives in
//! `crate::share`, not here — this module only ever talks to Postgres.

use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::{ShareGrant, ShareId, SharePermissions};
use crate::Result;

#[derive(Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    const SELECT_COLUMNS: &'static str =
        "share_id, owner, object_keys, created_at, updated_at, expire_at, allow_download, \
         password_hash, permissions, deleted_at";

    fn row_to_grant(row: PgRow) -> Result<ShareGrant> {
        let object_keys_json: serde_json::Value = row.try_get("object_keys")?;
        let permissions_json: serde_json::Value = row.try_get("permissions")?;

        Ok(ShareGrant {
            share_id: ShareId::from_string(row.try_get::<String, _>("share_id")?),
            owner: row.try_get("owner")?,
            object_keys: serde_json::from_value(object_keys_json).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expire_at: row.try_get("expire_at")?,
            allow_download: row.try_get("allow_download")?,
            password_hash: row.try_get("password_hash")?,
            permissions: serde_json::from_value(permissions_json).unwrap_or_default(),
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    pub async fn insert(&self, grant: &ShareGrant) -> Result<ShareGrant> {
        let query = format!(
            "INSERT INTO shares (share_id, owner, object_keys, created_at, updated_at, expire_at, \
             allow_download, password_hash, permissions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(grant.share_id.as_str())
            .bind(&grant.owner)
            .bind(serde_json::to_value(&grant.object_keys)?)
            .bind(grant.created_at)
            .bind(grant.updated_at)
            .bind(grant.expire_at)
            .bind(grant.allow_download)
            .bind(&grant.password_hash)
            .bind(serde_json::to_value(&grant.permissions)?)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_grant(row)
    }

    pub async fn find(&self, share_id: &ShareId) -> Result<Option<ShareGrant>> {
        let query = format!(
            "SELECT {} FROM shares WHERE share_id = $1 AND deleted_at IS NULL",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query).bind(share_id.as_str()).fetch_optional(&self.pool).await?;
        row.map(Self::row_to_grant).transpose()
    }

    pub async fn update_permissions(
        &self,
        share_id: &ShareId,
        permissions: &SharePermissions,
        allow_download: Option<bool>,
    ) -> Result<Option<ShareGrant>> {
        let existing = self.find(share_id).await?;
        let Some(mut grant) = existing else { return Ok(None) };

        grant.permissions = permissions.clone();
        if let Some(v) = allow_download {
            grant.allow_download = v;
        }
        grant.updated_at = Utc::now();

        let query = format!(
            "UPDATE shares SET permissions = $2, allow_download = $3, updated_at = $4 \
             WHERE share_id = $1 AND deleted_at IS NULL RETURNING {}",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(share_id.as_str())
            .bind(serde_json::to_value(&grant.permissions)?)
            .bind(grant.allow_download)
            .bind(grant.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(Self::row_to_grant(row)?))
    }

    pub async fn soft_delete(&self, share_id: &ShareId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE shares SET deleted_at = $2, updated_at = $2 WHERE share_id = $1 AND deleted_at IS NULL",
        )
        .bind(share_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Shares referencing any of `object_keys`, for the purge-cascade
    /// invalidation in §4.5/§4.7.
    pub async fn find_referencing(&self, tenant_prefix: &str) -> Result<Vec<ShareGrant>> {
        let query = format!(
            "SELECT {} FROM shares WHERE deleted_at IS NULL \
             AND EXISTS (SELECT 1 FROM jsonb_array_elements_text(object_keys) AS key WHERE key LIKE $1)",
            Self::SELECT_COLUMNS
        );
        let like_pattern = format!("{tenant_prefix}%");
        let rows = sqlx::query(&query).bind(like_pattern).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_grant).collect()
    }

    pub async fn list_expired(&self) -> Result<Vec<ShareGrant>> {
        let query = format!(
            "SELECT {} FROM shares WHERE deleted_at IS NULL AND expire_at IS NOT NULL AND expire_at <= $1",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(Utc::now()).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_grant).collect()
    }

    /// §6 `GET /shares`: every live grant owned by `owner`, newest first —
    /// §3 requires this ordering to be stable.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<ShareGrant>> {
        let query = format!(
            "SELECT {} FROM shares WHERE owner = $1 AND deleted_at IS NULL ORDER BY created_at DESC",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(owner).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_grant).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_include_password_hash_for_internal_use_only() {
        assert!(ShareRepository::SELECT_COLUMNS.contains("password_hash"));
    }
}
