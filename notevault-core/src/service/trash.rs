//! C7 Trash Service (§4.7): views the metadata store through the unscoped
//! `deleted_at IS NOT NULL` predicate. By the time a record lands here its
//! object bytes are already gone (§4.6 soft-delete removes them eagerly), so
//! nothing in this service ever touches C1 — it only ever moves or removes
//! rows and cascades into C5 invalidation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::{BatchResult, FileRecord, ItemResult, Page, PageParams};
use crate::repository::FileRepository;
use crate::share::ShareRegistry;
use crate::Result;

pub struct TrashService {
    repo: FileRepository,
    shares: Arc<ShareRegistry>,
    retention_days: i64,
}

impl TrashService {
    #[must_use]
    pub fn new(repo: FileRepository, shares: Arc<ShareRegistry>, retention_days: i64) -> Self {
        Self { repo, shares, retention_days }
    }

    pub async fn list(&self, tenant: &str, params: PageParams) -> Result<Page<FileRecord>> {
        self.repo.list_trash(tenant, params).await
    }

    /// §4.7 "restore(tenant, keys[])": clears `deleted_at` on each key;
    /// returns the affected count. A key that isn't trashed (already
    /// restored, never existed) simply doesn't count — this never fails the
    /// whole call.
    pub async fn restore(&self, tenant: &str, object_keys: &[String]) -> Result<u64> {
        let mut affected = 0u64;
        for key in object_keys {
            match self.repo.restore(tenant, key).await {
                Ok(true) => affected += 1,
                Ok(false) => {}
                Err(e) => warn!(tenant, object_key = %key, error = %e, "trash restore failed"),
            }
        }
        Ok(affected)
    }

    /// §4.7 "delete-permanently(tenant, keys[])": hard-deletes rows, then
    /// invokes share invalidation. S3 is never touched here — the objects
    /// are already gone.
    pub async fn delete_permanently(&self, tenant: &str, object_keys: &[String]) -> Result<u64> {
        let mut purged = Vec::with_capacity(object_keys.len());
        for key in object_keys {
            match self.repo.hard_delete(tenant, key).await {
                Ok(true) => purged.push(key.clone()),
                Ok(false) => {}
                Err(e) => warn!(tenant, object_key = %key, error = %e, "trash purge failed"),
            }
        }

        if !purged.is_empty() {
            if let Err(e) = self.shares.invalidate_for_object_keys(tenant, &purged).await {
                warn!(tenant, error = %e, "failed to invalidate shares during purge");
            }
        }

        Ok(purged.len() as u64)
    }

    /// §4.7 "empty(tenant)": enumerates every trashed key for `tenant` and
    /// purges them all.
    pub async fn empty(&self, tenant: &str) -> Result<u64> {
        let trashed = self.repo.list_all_trash(tenant).await?;
        let keys: Vec<String> = trashed.into_iter().map(|r| r.object_key).collect();
        self.delete_permanently(tenant, &keys).await
    }

    /// §4.7/§4.9 "auto-clean(tenant, before)": same as `empty` but scoped to
    /// rows trashed before `before`.
    pub async fn auto_clean(&self, tenant: &str, before: DateTime<Utc>) -> Result<u64> {
        let stale = self.repo.list_trash_older_than(tenant, before).await?;
        let keys: Vec<String> = stale.into_iter().map(|r| r.object_key).collect();
        self.delete_permanently(tenant, &keys).await
    }

    /// Per-tenant auto-clean sweep using the configured retention window
    /// (§4.9 job #1: 07:00/19:00 daily, `before = now - retention`).
    pub async fn auto_clean_all_tenants(&self) -> BatchResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let tenants = match self.repo.distinct_tenants().await {
            Ok(t) => t,
            Err(e) => return BatchResult::from_results(vec![ItemResult::err("distinct-tenants", e)]),
        };

        let mut results = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            match self.auto_clean(&tenant, cutoff).await {
                Ok(count) => results.push(ItemResult::ok(tenant, count)),
                Err(e) => {
                    warn!(tenant, error = %e, "trash auto-clean failed for tenant");
                    results.push(ItemResult::err(tenant, e));
                }
            }
        }
        BatchResult::from_results(results)
    }

    pub async fn distinct_tenants(&self) -> Result<Vec<String>> {
        self.repo.distinct_tenants().await
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn module_compiles() {}
}
