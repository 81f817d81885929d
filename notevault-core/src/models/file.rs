//! File metadata record (§3 "File record (C2)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical object as tracked in the metadata repository.
///
/// Identity is `(tenant, object_key)`; `id` is a surrogate row id used only
/// for joins, never for equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub tenant: String,
    pub object_key: String,
    pub file_name: String,
    pub size: i64,
    pub etag: String,
    pub content_type: String,
    pub category: String,
    pub description: String,
    /// Ordered list of tags, persisted as a JSON text column.
    pub tags: Vec<String>,
    pub bucket: String,
    pub version_id: Option<String>,
    pub storage_class: String,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    #[must_use]
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// §4.6 "key formatting invariant": every object key a tenant touches
    /// starts with `"<tenant>/"`. This is the only authorization predicate
    /// enforced by the core.
    #[must_use]
    pub fn belongs_to(tenant: &str, object_key: &str) -> bool {
        object_key
            .strip_prefix(tenant)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some()
    }
}

/// Patch applied by `upsert` (§4.2): only explicitly-set fields are written;
/// absent fields never clear existing values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilePatch {
    pub file_name: Option<String>,
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub bucket: Option<String>,
    pub version_id: Option<String>,
    pub storage_class: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FilePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none()
            && self.size.is_none()
            && self.etag.is_none()
            && self.content_type.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.bucket.is_none()
            && self.version_id.is_none()
            && self.storage_class.is_none()
            && self.last_modified.is_none()
    }
}

/// One entry in a `list-versions` response (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version_id: String,
    pub etag: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_latest: bool,
}

/// One file to store in a batch direct-upload request (§4.6 "batch is
/// best-effort per item").
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub object_key: String,
    pub bucket: String,
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Result of a direct upload (§4.6 "returns the computed hash, ETag, version
/// id, bucket, location, last-modified").
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub record: FileRecord,
    pub content_md5: String,
}

/// Result of `move-object` (§4.6): the destination is retained even when the
/// source couldn't be removed, so failure to clean up the source is surfaced
/// as a warning rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub record: FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belongs_to_requires_slash_boundary() {
        assert!(FileRecord::belongs_to("u1", "u1/2025/09/a.md"));
        assert!(!FileRecord::belongs_to("u1", "u1x/2025/09/a.md"));
        assert!(!FileRecord::belongs_to("u1", "other-tenant/foo"));
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(FilePatch::default().is_empty());
        let patch = FilePatch {
            description: Some("d".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
