//! C5 Share Registry (§4.5): DB-first, cache-backed CRUD over share grants.
//! Every read goes to Postgres on a cache miss and repopulates the cache
//! before returning; every write invalidates the cache entry (locally and,
//! via `CacheInvalidationService`, across nodes) rather than trying to keep
//! it in sync in place.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::cache::{CacheInvalidationService, CacheManager};
use crate::models::{CreateShareRequest, ShareGrant, ShareId, ShareInfo, SharePermissions};
use crate::repository::ShareRepository;
use crate::{Error, Result};

const MIN_CACHE_TTL: Duration = Duration::from_secs(600);
const MAX_CACHE_TTL: Duration = Duration::from_secs(1800);

/// `base64url(sha256(password))`, the scheme §4.5 mandates for share
/// passwords (plaintext never touches storage, but this is explicitly not a
/// credential store — no per-password salt or work factor).
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub struct ShareRegistry {
    repo: ShareRepository,
    cache: CacheManager,
    invalidation: Option<Arc<CacheInvalidationService>>,
}

impl ShareRegistry {
    #[must_use]
    pub fn new(
        repo: ShareRepository,
        cache: CacheManager,
        invalidation: Option<Arc<CacheInvalidationService>>,
    ) -> Self {
        Self { repo, cache, invalidation }
    }

    /// §4.5 "cache TTL policy": 10 minutes when a share never expires,
    /// otherwise `min(time-to-expire, 30 minutes)`; already-expired grants
    /// bypass the cache entirely.
    fn cache_ttl(grant: &ShareGrant) -> Option<Duration> {
        match grant.expire_at {
            None => Some(MIN_CACHE_TTL),
            Some(expire_at) => {
                let remaining = expire_at.signed_duration_since(Utc::now());
                let remaining = remaining.to_std().ok()?;
                Some(remaining.min(MAX_CACHE_TTL))
            }
        }
    }

    async fn cache_grant(&self, grant: &ShareGrant) {
        if let Some(ttl) = Self::cache_ttl(grant) {
            let key = self.cache.keys().share(grant.share_id.as_str());
            if let Err(e) = self.cache.set_json(&key, grant, Some(ttl)).await {
                tracing::warn!(share_id = %grant.share_id, error = %e, "failed to populate share cache");
            }
        }
    }

    async fn drop_cache(&self, share_id: &ShareId) {
        let key = self.cache.keys().share(share_id.as_str());
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(share_id = %share_id, error = %e, "failed to drop share cache entry");
        }
        if let Some(invalidation) = &self.invalidation {
            let _ = invalidation.invalidate_share(share_id.as_str()).await;
        }
    }

    pub async fn create(&self, owner: &str, request: CreateShareRequest) -> Result<ShareInfo> {
        if request.object_keys.is_empty() {
            return Err(Error::InvalidArgument("share must reference at least one object key".to_string()));
        }

        let now = Utc::now();
        let expire_at = if request.expire_days > 0 {
            Some(now + chrono::Duration::days(request.expire_days))
        } else {
            None
        };

        let mut users = std::collections::BTreeSet::new();
        users.insert(owner.to_string());

        let grant = ShareGrant {
            share_id: ShareId::new(),
            owner: owner.to_string(),
            object_keys: request.object_keys,
            created_at: now,
            updated_at: now,
            expire_at,
            allow_download: request.allow_download,
            password_hash: if request.password.is_empty() {
                String::new()
            } else {
                hash_password(&request.password)
            },
            permissions: SharePermissions { allow_anonymous: false, users },
            deleted_at: None,
        };

        let stored = self.repo.insert(&grant).await?;
        self.cache_grant(&stored).await;
        Ok(stored.to_info())
    }

    async fn fetch(&self, share_id: &ShareId) -> Result<ShareGrant> {
        let key = self.cache.keys().share(share_id.as_str());
        if let Some(cached) = self.cache.get_json::<ShareGrant>(&key).await? {
            return Ok(cached);
        }

        let grant = self
            .repo
            .find(share_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("share not found: {share_id}")))?;
        self.cache_grant(&grant).await;
        Ok(grant)
    }

    /// Resolves a share for read access, enforcing expiry and password
    /// checks; never returns `password_hash` to the caller (§4.5 "Access").
    pub async fn access(&self, share_id: &ShareId, password: Option<&str>) -> Result<ShareInfo> {
        let grant = self.fetch(share_id).await?;

        if grant.is_expired(Utc::now()) {
            return Err(Error::ShareExpired);
        }

        if grant.has_password() {
            let supplied = password.map(hash_password).unwrap_or_default();
            if supplied.is_empty() || supplied != grant.password_hash {
                return Err(Error::InvalidPassword);
            }
        }

        Ok(grant.to_info())
    }

    /// §4.5 "download is single-object-only": a multi-object share can be
    /// browsed but not downloaded as a unit.
    pub async fn resolve_download_key(&self, share_id: &ShareId, password: Option<&str>) -> Result<String> {
        let grant = self.fetch(share_id).await?;

        if grant.is_expired(Utc::now()) {
            return Err(Error::ShareExpired);
        }
        if !grant.allow_download {
            return Err(Error::Forbidden("share does not permit downloads".to_string()));
        }
        if grant.has_password() {
            let supplied = password.map(hash_password).unwrap_or_default();
            if supplied.is_empty() || supplied != grant.password_hash {
                return Err(Error::InvalidPassword);
            }
        }
        match grant.object_keys.as_slice() {
            [single] => Ok(single.clone()),
            _ => Err(Error::InvalidArgument(
                "share references multiple objects; download requires exactly one".to_string(),
            )),
        }
    }

    fn require_owner(grant: &ShareGrant, caller: &str) -> Result<()> {
        if grant.owner != caller {
            return Err(Error::Forbidden("only the share owner may modify it".to_string()));
        }
        Ok(())
    }

    pub async fn update_permissions(
        &self,
        share_id: &ShareId,
        caller: &str,
        permissions: SharePermissions,
        allow_download: Option<bool>,
    ) -> Result<ShareInfo> {
        let grant = self.fetch(share_id).await?;
        Self::require_owner(&grant, caller)?;

        let mut permissions = permissions;
        permissions.users.insert(grant.owner.clone());

        let updated = self
            .repo
            .update_permissions(share_id, &permissions, allow_download)
            .await?
            .ok_or_else(|| Error::NotFound(format!("share not found: {share_id}")))?;

        self.drop_cache(share_id).await;
        Ok(updated.to_info())
    }

    pub async fn add_user(&self, share_id: &ShareId, caller: &str, user: &str) -> Result<ShareInfo> {
        let grant = self.fetch(share_id).await?;
        Self::require_owner(&grant, caller)?;
        let mut permissions = grant.permissions.clone();
        permissions.users.insert(user.to_string());
        self.update_permissions(share_id, caller, permissions, None).await
    }

    pub async fn remove_user(&self, share_id: &ShareId, caller: &str, user: &str) -> Result<ShareInfo> {
        let grant = self.fetch(share_id).await?;
        Self::require_owner(&grant, caller)?;
        let mut permissions = grant.permissions.clone();
        permissions.users.remove(user);
        self.update_permissions(share_id, caller, permissions, None).await
    }

    pub async fn revoke(&self, share_id: &ShareId, caller: &str) -> Result<()> {
        let grant = self.fetch(share_id).await?;
        Self::require_owner(&grant, caller)?;
        self.repo.soft_delete(share_id).await?;
        self.drop_cache(share_id).await;
        Ok(())
    }

    /// §6 `GET /shares`: every live grant `owner` created, newest first.
    pub async fn list_owned(&self, owner: &str) -> Result<Vec<ShareInfo>> {
        let grants = self.repo.list_by_owner(owner).await?;
        Ok(grants.into_iter().map(|g| g.to_info()).collect())
    }

    /// Invalidates every share referencing any of `object_keys` (§4.5
    /// "invalidation by object key"): finds shares owned by `tenant` whose
    /// `object_keys` intersect `keys`, soft-deletes them, and evicts their
    /// cached entries. A grant's soft-delete failure doesn't stop the others
    /// from being processed; the caller treats this whole call as
    /// best-effort (§7 "best-effort cascades").
    pub async fn invalidate_for_object_keys(&self, tenant: &str, object_keys: &[String]) -> Result<()> {
        let referencing = self.repo.find_referencing(&format!("{tenant}/")).await?;
        for grant in referencing {
            if grant.references_any(object_keys) {
                if let Err(e) = self.repo.soft_delete(&grant.share_id).await {
                    tracing::warn!(share_id = %grant.share_id, error = %e, "failed to soft-delete share during invalidation");
                }
                self.drop_cache(&grant.share_id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_is_deterministic_and_urlsafe() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_eq!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn different_passwords_hash_differently() {
        assert_ne!(hash_password("a"), hash_password("b"));
    }

    #[test]
    fn cache_ttl_caps_at_thirty_minutes() {
        let grant = ShareGrant {
            share_id: ShareId::new(),
            owner: "u1".to_string(),
            object_keys: vec!["u1/a".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expire_at: Some(Utc::now() + chrono::Duration::hours(5)),
            allow_download: true,
            password_hash: String::new(),
            permissions: SharePermissions::default(),
            deleted_at: None,
        };
        let ttl = ShareRegistry::cache_ttl(&grant).unwrap();
        assert!(ttl <= MAX_CACHE_TTL);
    }

    #[test]
    fn cache_ttl_is_ten_minutes_with_no_expiry() {
        let grant = ShareGrant {
            share_id: ShareId::new(),
            owner: "u1".to_string(),
            object_keys: vec!["u1/a".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expire_at: None,
            allow_download: true,
            password_hash: String::new(),
            permissions: SharePermissions::default(),
            deleted_at: None,
        };
        assert_eq!(ShareRegistry::cache_ttl(&grant), Some(MIN_CACHE_TTL));
    }

    #[test]
    fn cache_ttl_bypasses_already_expired_grant() {
        let grant = ShareGrant {
            share_id: ShareId::new(),
            owner: "u1".to_string(),
            object_keys: vec!["u1/a".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expire_at: Some(Utc::now() - chrono::Duration::seconds(5)),
            allow_download: true,
            password_hash: String::new(),
            permissions: SharePermissions::default(),
            deleted_at: None,
        };
        assert_eq!(ShareRegistry::cache_ttl(&grant), None);
    }
}
