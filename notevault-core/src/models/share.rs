//! Share grant model (§3 "Share grant (C5)", §4.5).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ShareId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePermissions {
    pub allow_anonymous: bool,
    pub users: BTreeSet<String>,
}

/// A share grant as persisted. `password_hash` is never exposed to callers;
/// [`ShareInfo`] is the public view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareGrant {
    pub share_id: ShareId,
    pub owner: String,
    pub object_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
    pub allow_download: bool,
    /// Empty string means "no password set".
    pub password_hash: String,
    pub permissions: SharePermissions,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ShareGrant {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }

    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    #[must_use]
    pub fn references_any(&self, keys: &[String]) -> bool {
        self.object_keys.iter().any(|k| keys.contains(k))
    }

    /// Public projection excluding `password_hash` (§4.5 "Access").
    #[must_use]
    pub fn to_info(&self) -> ShareInfo {
        ShareInfo {
            share_id: self.share_id.clone(),
            owner: self.owner.clone(),
            object_keys: self.object_keys.clone(),
            created_at: self.created_at,
            expire_at: self.expire_at,
            allow_download: self.allow_download,
            has_password: self.has_password(),
            permissions: self.permissions.clone(),
        }
    }
}

/// The view returned by `access()`/`get()`; never carries `password_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInfo {
    pub share_id: ShareId,
    pub owner: String,
    pub object_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
    pub allow_download: bool,
    pub has_password: bool,
    pub permissions: SharePermissions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShareRequest {
    pub object_keys: Vec<String>,
    #[serde(default)]
    pub expire_days: i64,
    #[serde(default)]
    pub allow_download: bool,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSharePermissionsRequest {
    pub allow_anonymous: Option<bool>,
    pub allow_download: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> ShareGrant {
        let now = Utc::now();
        ShareGrant {
            share_id: ShareId::new(),
            owner: "u1".to_string(),
            object_keys: vec!["u1/2025/09/a.md".to_string()],
            created_at: now,
            updated_at: now,
            expire_at: None,
            allow_download: true,
            password_hash: String::new(),
            permissions: SharePermissions {
                allow_anonymous: true,
                users: BTreeSet::from(["u1".to_string()]),
            },
            deleted_at: None,
        }
    }

    #[test]
    fn to_info_hides_password_hash() {
        let mut g = grant();
        g.password_hash = "deadbeef".to_string();
        let info = g.to_info();
        assert!(info.has_password);
    }

    #[test]
    fn no_expiry_never_expires() {
        assert!(!grant().is_expired(Utc::now()));
    }

    #[test]
    fn owner_is_always_in_users() {
        assert!(grant().permissions.users.contains("u1"));
    }
}
