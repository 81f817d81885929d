//! Cache manager: coordinates the configured KV backend with the key builder
//! and the local-TTL envelope (C3, used directly by the Share Registry C5).

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::kv::{Envelope, KvCache};
use crate::cache::key_builder::KeyBuilder;
use crate::Result;

#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn KvCache>,
    keys: Arc<KeyBuilder>,
}

impl CacheManager {
    #[must_use]
    pub fn new(backend: Arc<dyn KvCache>, keys: Arc<KeyBuilder>) -> Self {
        Self { backend, keys }
    }

    #[must_use]
    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Writes `value` wrapped in a local-TTL [`Envelope`] under `key`.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        let envelope = Envelope::new(payload, ttl);
        self.backend.set(key, envelope.encode()?, ttl).await
    }

    /// Reads and unwraps the envelope at `key`; returns `None` on miss or
    /// lazily-detected expiry (the backend entry is removed in that case).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.backend.get(key).await? else {
            return Ok(None);
        };
        let envelope = Envelope::decode(&bytes)?;
        if envelope.is_expired() {
            self.backend.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&envelope.p)?))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv::MemoryKv;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(MemoryKv::new()), Arc::new(KeyBuilder::default()))
    }

    #[tokio::test]
    async fn json_round_trips_through_envelope() {
        let mgr = manager();
        mgr.set_json("k", &Sample { value: 7 }, None).await.unwrap();
        let back: Option<Sample> = mgr.get_json("k").await.unwrap();
        assert_eq!(back, Some(Sample { value: 7 }));
    }

    #[tokio::test]
    async fn expired_envelope_reads_as_miss() {
        let mgr = manager();
        mgr.set_json("k", &Sample { value: 1 }, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let back: Option<Sample> = mgr.get_json("k").await.unwrap();
        assert_eq!(back, None);
    }
}
