//! KV Cache (C3): typed key -> bytes store with an optional local-TTL envelope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Local-TTL wrapper written by callers that want expiry enforced by the
/// cache itself rather than by the backend (§3 "KV entry (C3)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Payload bytes.
    pub p: Vec<u8>,
    /// Expiry as unix nanoseconds; zero means "never expires".
    pub e: i64,
}

impl Envelope {
    #[must_use]
    pub fn new(payload: Vec<u8>, ttl: Option<Duration>) -> Self {
        let e = ttl
            .and_then(|ttl| {
                let nanos = i64::try_from(ttl.as_nanos()).ok()?;
                chrono::Utc::now().timestamp_nanos_opt().map(|now| now + nanos)
            })
            .unwrap_or(0);
        Self { p: payload, e }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.e != 0 && self.e <= chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Backend-agnostic KV contract (§4.3). Pattern matching on `keys()` is
/// best-effort; callers must not rely on glob semantics beyond exact match.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<std::time::Instant>,
}

/// In-memory backend: a concurrent hash map guarded by a single lock, with
/// lazy expiry on read (§4.3).
#[derive(Default)]
pub struct MemoryKv {
    store: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all entries whose TTL has elapsed; invoked by the optional
    /// sweeper task (§4.3) as well as opportunistically by callers.
    pub fn sweep(&self) {
        let now = std::time::Instant::now();
        self.store.write().retain(|_, entry| {
            entry.expires_at.is_none_or(|expires_at| expires_at > now)
        });
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = std::time::Instant::now();
        let mut store = self.store.write();
        match store.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|exp| exp <= now) => {
                store.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| std::time::Instant::now() + ttl);
        self.store.write().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.sweep();
        let store = self.store.read();
        if let Some(prefix) = pattern.strip_suffix('*') {
            Ok(store
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        } else {
            Ok(store
                .keys()
                .filter(|k| k.as_str() == pattern)
                .cloned()
                .collect())
        }
    }
}

/// Redis-backed KV (L2), used directly or behind [`super::manager::TieredCache`].
pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
}

#[async_trait]
impl KvCache for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<Vec<u8>> = redis::AsyncCommands::get(&mut conn, key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                redis::AsyncCommands::set_ex::<_, _, ()>(&mut conn, key, value, secs).await?;
            }
            None => {
                redis::AsyncCommands::set::<_, _, ()>(&mut conn, key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::AsyncCommands::del::<_, ()>(&mut conn, key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = redis::AsyncCommands::exists(&mut conn, key).await?;
        Ok(exists)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = redis::AsyncCommands::keys(&mut conn, pattern).await?;
        Ok(keys)
    }
}

/// Builds the configured backend (§10.1 `CacheConfig::backend`).
pub fn build_backend(
    backend: &crate::config::KvBackend,
    redis_url: &str,
) -> Result<Arc<dyn KvCache>> {
    match backend {
        crate::config::KvBackend::Memory => Ok(Arc::new(MemoryKv::new())),
        crate::config::KvBackend::Redis => Ok(Arc::new(RedisKv::new(redis_url)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_kv_round_trips() {
        let kv = MemoryKv::new();
        kv.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(kv.exists("k").await.unwrap());
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_kv_expires_lazily() {
        let kv = MemoryKv::new();
        kv.set("k", b"v".to_vec(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_kv_keys_supports_prefix_glob() {
        let kv = MemoryKv::new();
        kv.set("share:1", b"a".to_vec(), None).await.unwrap();
        kv.set("share:2", b"b".to_vec(), None).await.unwrap();
        kv.set("other:1", b"c".to_vec(), None).await.unwrap();
        let mut keys = kv.keys("share:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["share:1".to_string(), "share:2".to_string()]);
    }

    #[test]
    fn envelope_zero_expiry_never_expires() {
        let env = Envelope::new(b"x".to_vec(), None);
        assert_eq!(env.e, 0);
        assert!(!env.is_expired());
    }

    #[test]
    fn envelope_round_trips_through_encode() {
        let env = Envelope::new(b"payload".to_vec(), Some(Duration::from_secs(60)));
        let bytes = env.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded.p, b"payload");
        assert!(!decoded.is_expired());
    }
}
