//! C2 Metadata Repository (§4.2): the only component permitted to touch the
//! `files` table directly. Every query is tenant-scoped; callers are
//! trusted to have already checked `FileRecord::belongs_to`.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::{generate_id, FilePatch, FileRecord, Page, PageParams};
use crate::Result;

#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PgRow) -> Result<FileRecord> {
        let tags_json: serde_json::Value = row.try_get("tags")?;
        let tags = serde_json::from_value(tags_json).unwrap_or_default();

        Ok(FileRecord {
            id: row.try_get("id")?,
            tenant: row.try_get("tenant")?,
            object_key: row.try_get("object_key")?,
            file_name: row.try_get("file_name")?,
            size: row.try_get("size")?,
            etag: row.try_get("etag")?,
            content_type: row.try_get("content_type")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            tags,
            bucket: row.try_get("bucket")?,
            version_id: row.try_get("version_id")?,
            storage_class: row.try_get("storage_class")?,
            last_modified: row.try_get("last_modified")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, tenant, object_key, file_name, size, etag, content_type, \
         category, description, tags, bucket, version_id, storage_class, last_modified, \
         created_at, updated_at, deleted_at";

    pub async fn find_by_key(&self, tenant: &str, object_key: &str) -> Result<Option<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND object_key = $2 AND deleted_at IS NULL",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(tenant)
            .bind(object_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    /// Same lookup as `find_by_key` but including soft-deleted rows, for the
    /// trash service's restore/purge paths.
    pub async fn find_any_by_key(&self, tenant: &str, object_key: &str) -> Result<Option<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND object_key = $2",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(tenant)
            .bind(object_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    /// Creates the record if absent, otherwise applies `patch` to the
    /// existing row (§4.2 "create-or-patch"). Never clears a field the patch
    /// left unset.
    pub async fn upsert(
        &self,
        tenant: &str,
        object_key: &str,
        initial: &FileRecord,
        patch: &FilePatch,
    ) -> Result<FileRecord> {
        let existing = self.find_by_key(tenant, object_key).await?;
        let now = Utc::now();

        match existing {
            None => {
                let mut record = initial.clone();
                record.id = generate_id();
                record.created_at = now;
                record.updated_at = now;
                self.insert(&record).await
            }
            Some(mut record) => {
                if let Some(v) = &patch.file_name {
                    record.file_name = v.clone();
                }
                if let Some(v) = patch.size {
                    record.size = v;
                }
                if let Some(v) = &patch.etag {
                    record.etag = v.clone();
                }
                if let Some(v) = &patch.content_type {
                    record.content_type = v.clone();
                }
                if let Some(v) = &patch.category {
                    record.category = v.clone();
                }
                if let Some(v) = &patch.description {
                    record.description = v.clone();
                }
                if let Some(v) = &patch.tags {
                    record.tags = v.clone();
                }
                if let Some(v) = &patch.bucket {
                    record.bucket = v.clone();
                }
                if let Some(v) = &patch.version_id {
                    record.version_id = Some(v.clone());
                }
                if let Some(v) = &patch.storage_class {
                    record.storage_class = v.clone();
                }
                if let Some(v) = patch.last_modified {
                    record.last_modified = v;
                }
                record.updated_at = now;
                self.update(&record).await
            }
        }
    }

    async fn insert(&self, record: &FileRecord) -> Result<FileRecord> {
        let query = format!(
            "INSERT INTO files (id, tenant, object_key, file_name, size, etag, content_type, category, \
             description, tags, bucket, version_id, storage_class, last_modified, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {}",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&record.id)
            .bind(&record.tenant)
            .bind(&record.object_key)
            .bind(&record.file_name)
            .bind(record.size)
            .bind(&record.etag)
            .bind(&record.content_type)
            .bind(&record.category)
            .bind(&record.description)
            .bind(serde_json::to_value(&record.tags)?)
            .bind(&record.bucket)
            .bind(&record.version_id)
            .bind(&record.storage_class)
            .bind(record.last_modified)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_record(row)
    }

    async fn update(&self, record: &FileRecord) -> Result<FileRecord> {
        let query = format!(
            "UPDATE files SET file_name = $3, size = $4, etag = $5, content_type = $6, category = $7, \
             description = $8, tags = $9, bucket = $10, version_id = $11, storage_class = $12, \
             last_modified = $13, updated_at = $14 \
             WHERE tenant = $1 AND object_key = $2 AND deleted_at IS NULL \
             RETURNING {}",
            Self::SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&record.tenant)
            .bind(&record.object_key)
            .bind(&record.file_name)
            .bind(record.size)
            .bind(&record.etag)
            .bind(&record.content_type)
            .bind(&record.category)
            .bind(&record.description)
            .bind(serde_json::to_value(&record.tags)?)
            .bind(&record.bucket)
            .bind(&record.version_id)
            .bind(&record.storage_class)
            .bind(record.last_modified)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_record(row)
    }

    pub async fn soft_delete(&self, tenant: &str, object_key: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET deleted_at = $3, updated_at = $3 \
             WHERE tenant = $1 AND object_key = $2 AND deleted_at IS NULL",
        )
        .bind(tenant)
        .bind(object_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn restore(&self, tenant: &str, object_key: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET deleted_at = NULL, updated_at = $3 \
             WHERE tenant = $1 AND object_key = $2 AND deleted_at IS NOT NULL",
        )
        .bind(tenant)
        .bind(object_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn hard_delete(&self, tenant: &str, object_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE tenant = $1 AND object_key = $2")
            .bind(tenant)
            .bind(object_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_trash(&self, tenant: &str, params: PageParams) -> Result<Page<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND deleted_at IS NOT NULL \
             ORDER BY deleted_at DESC LIMIT $2 OFFSET $3",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(tenant)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;
        let items = rows.into_iter().map(Self::row_to_record).collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE tenant = $1 AND deleted_at IS NOT NULL",
        )
        .bind(tenant)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(items, total.max(0) as u64, params))
    }

    /// Every trashed row for `tenant`, unpaginated — backs `empty(tenant)`
    /// (§4.7).
    pub async fn list_all_trash(&self, tenant: &str) -> Result<Vec<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND deleted_at IS NOT NULL",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(tenant).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    /// Trashed rows for `tenant` older than `cutoff` — backs
    /// `auto-clean(tenant, before)` (§4.7, §4.9).
    pub async fn list_trash_older_than(&self, tenant: &str, cutoff: DateTime<Utc>) -> Result<Vec<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND deleted_at IS NOT NULL AND deleted_at < $2",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(tenant).bind(cutoff).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    pub async fn list_by_month(&self, tenant: &str, year: i32, month: u32) -> Result<Vec<FileRecord>> {
        let start = chrono::NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
            .ok_or_else(|| crate::Error::InvalidArgument(format!("invalid year/month: {year}-{month}")))?;
        let end = if month == 12 {
            chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            chrono::NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .ok_or_else(|| crate::Error::InvalidArgument(format!("invalid year/month: {year}-{month}")))?;

        let query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND deleted_at IS NULL \
             AND created_at >= $2 AND created_at < $3 ORDER BY created_at DESC",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(tenant)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    pub async fn distinct_tenants(&self) -> Result<Vec<String>> {
        let tenants: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT tenant FROM files ORDER BY tenant").fetch_all(&self.pool).await?;
        Ok(tenants)
    }

    pub async fn count_active(&self, tenant: &str) -> Result<(u64, u64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files WHERE tenant = $1 AND deleted_at IS NULL",
        )
        .bind(tenant)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0.max(0) as u64, row.1.max(0) as u64))
    }

    /// Active-row count/size for trashed objects too — backs the stats
    /// service's storage-summary breakdown (§4.8).
    pub async fn count_trashed(&self, tenant: &str) -> Result<(u64, u64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files WHERE tenant = $1 AND deleted_at IS NOT NULL",
        )
        .bind(tenant)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0.max(0) as u64, row.1.max(0) as u64))
    }

    /// `(content_type, count, total_size_bytes)` grouped over active objects
    /// (§4.8 "by content type").
    pub async fn count_by_content_type(&self, tenant: &str) -> Result<Vec<(String, u64, u64)>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT content_type, COUNT(*), COALESCE(SUM(size), 0) FROM files \
             WHERE tenant = $1 AND deleted_at IS NULL GROUP BY content_type ORDER BY content_type",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(ct, n, size)| (ct, n.max(0) as u64, size.max(0) as u64)).collect())
    }

    /// `(bucket, count, total_size_bytes)` grouped over active objects (§4.8
    /// "by bucket").
    pub async fn count_by_bucket(&self, tenant: &str) -> Result<Vec<(String, u64, u64)>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT bucket, COUNT(*), COALESCE(SUM(size), 0) FROM files \
             WHERE tenant = $1 AND deleted_at IS NULL GROUP BY bucket ORDER BY bucket",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(b, n, size)| (b, n.max(0) as u64, size.max(0) as u64)).collect())
    }

    /// Counts active objects into fixed size buckets (§4.8 "by size bucket"):
    /// `< 1MiB`, `1-10MiB`, `10-100MiB`, `100MiB-1GiB`, `>= 1GiB`.
    pub async fn count_by_size_bucket(&self, tenant: &str) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT CASE \
                WHEN size < 1048576 THEN '<1MiB' \
                WHEN size < 10485760 THEN '1-10MiB' \
                WHEN size < 104857600 THEN '10-100MiB' \
                WHEN size < 1073741824 THEN '100MiB-1GiB' \
                ELSE '>=1GiB' \
             END AS bucket, COUNT(*) \
             FROM files WHERE tenant = $1 AND deleted_at IS NULL GROUP BY bucket",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(b, n)| (b, n.max(0) as u64)).collect())
    }

    /// `(date, count, total_size_bytes)` of uploads per day over the last
    /// `days` days (§4.8 "trend"), oldest first.
    pub async fn upload_trend(&self, tenant: &str, days: i64) -> Result<Vec<(chrono::NaiveDate, u64, u64)>> {
        let since = Utc::now() - chrono::Duration::days(days);
        let rows: Vec<(chrono::NaiveDate, i64, i64)> = sqlx::query_as(
            "SELECT created_at::date AS day, COUNT(*), COALESCE(SUM(size), 0) FROM files \
             WHERE tenant = $1 AND created_at >= $2 GROUP BY day ORDER BY day",
        )
        .bind(tenant)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(d, n, size)| (d, n.max(0) as u64, size.max(0) as u64)).collect())
    }

    /// Uploads on a single calendar day (§4.8 "uploads-daily").
    pub async fn uploads_on(&self, tenant: &str, day: chrono::NaiveDate) -> Result<(u64, u64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files \
             WHERE tenant = $1 AND created_at::date = $2",
        )
        .bind(tenant)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0.max(0) as u64, row.1.max(0) as u64))
    }

    /// Uploads within `[from, to]` inclusive (§4.8 "uploads-range").
    pub async fn uploads_between(
        &self,
        tenant: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<(u64, u64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files \
             WHERE tenant = $1 AND created_at::date >= $2 AND created_at::date <= $3",
        )
        .bind(tenant)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0.max(0) as u64, row.1.max(0) as u64))
    }

    /// §6 `POST /files/search`: substring match over `file_name`/`category`
    /// against active rows, newest first. An empty `query` degenerates to a
    /// plain paginated listing of the tenant's active files.
    pub async fn search(&self, tenant: &str, query: &str, params: PageParams) -> Result<Page<FileRecord>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

        let list_query = format!(
            "SELECT {} FROM files WHERE tenant = $1 AND deleted_at IS NULL \
             AND (file_name ILIKE $2 OR category ILIKE $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            Self::SELECT_COLUMNS
        );
        let rows = sqlx::query(&list_query)
            .bind(tenant)
            .bind(&pattern)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;
        let items = rows.into_iter().map(Self::row_to_record).collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE tenant = $1 AND deleted_at IS NULL \
             AND (file_name ILIKE $2 OR category ILIKE $2)",
        )
        .bind(tenant)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(items, total.max(0) as u64, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_matches_file_record_fields() {
        for column in [
            "id",
            "tenant",
            "object_key",
            "file_name",
            "size",
            "etag",
            "content_type",
            "category",
            "description",
            "tags",
            "bucket",
            "version_id",
            "storage_class",
            "last_modified",
            "created_at",
            "updated_at",
            "deleted_at",
        ] {
            assert!(FileRepository::SELECT_COLUMNS.contains(column), "missing column {column}");
        }
    }
}
