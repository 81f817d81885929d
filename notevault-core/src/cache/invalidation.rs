//! Cross-node cache invalidation fan-out (§11 "Cache invalidation pub/sub
//! fan-out"), generalized from a single Redis Pub/Sub channel: any node that
//! mutates a share or purges an object broadcasts here so every other node
//! drops its local entry instead of serving a stale one for up to the TTL.

use futures::StreamExt;
use redis::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

pub const CACHE_INVALIDATION_CHANNEL: &str = "notevault:cache:invalidation";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationMessage {
    /// A single share grant changed or was soft-deleted.
    Share { share_id: String },
    /// Every share referencing this object key was invalidated (purge cascade).
    ObjectKeys { tenant: String, object_keys: Vec<String> },
    All,
}

pub struct CacheInvalidationService {
    redis_client: Option<Client>,
    local_sender: broadcast::Sender<InvalidationMessage>,
    node_id: String,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl Clone for CacheInvalidationService {
    fn clone(&self) -> Self {
        Self {
            redis_client: self.redis_client.clone(),
            local_sender: self.local_sender.clone(),
            node_id: self.node_id.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl CacheInvalidationService {
    #[must_use]
    pub fn new(redis_client: Option<Client>, node_id: String) -> Self {
        let (local_sender, _) = broadcast::channel(1024);
        Self {
            redis_client,
            local_sender,
            node_id,
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let Some(client) = self.redis_client.clone() else {
            info!("redis not configured, cache invalidation is local-only");
            return Ok(());
        };

        let local_sender = self.local_sender.clone();
        let node_id = self.node_id.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                    debug!("cache invalidation listener shutting down");
                    break;
                }

                match Self::run_subscriber(&client, &local_sender, &node_id, shutdown.clone()).await {
                    Ok(()) => break,
                    Err(e) => {
                        error!(error = %e, "invalidation subscriber error, reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
            info!("cache invalidation listener stopped");
        });

        Ok(())
    }

    async fn run_subscriber(
        client: &Client,
        local_sender: &broadcast::Sender<InvalidationMessage>,
        node_id: &str,
        shutdown: Arc<std::sync::atomic::AtomicBool>,
    ) -> Result<()> {
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::Internal(format!("failed to get redis pub/sub connection: {e}")))?;

        pubsub
            .subscribe(CACHE_INVALIDATION_CHANNEL)
            .await
            .map_err(|e| Error::Internal(format!("failed to subscribe: {e}")))?;

        info!(node_id = %node_id, channel = %CACHE_INVALIDATION_CHANNEL, "subscribed to cache invalidation channel");

        let mut message_stream = pubsub.on_message();

        loop {
            if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }

            match tokio::time::timeout(std::time::Duration::from_secs(1), message_stream.next()).await {
                Ok(Some(msg)) => {
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "invalid payload in cache invalidation message");
                            continue;
                        }
                    };

                    match serde_json::from_str::<InvalidationMessage>(&payload) {
                        Ok(invalidation) => {
                            debug!(node_id = %node_id, ?invalidation, "received cache invalidation message");
                            if let Err(e) = local_sender.send(invalidation) {
                                warn!(error = %e, "failed to broadcast invalidation locally");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, json = %payload, "failed to parse invalidation message");
                        }
                    }
                }
                Ok(None) => {
                    info!("redis pub/sub stream ended, reconnecting");
                    return Err(Error::Internal("redis pub/sub stream ended".to_string()));
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.local_sender.subscribe()
    }

    /// Publishes to Redis only; the caller is expected to have already
    /// invalidated its own local entry.
    pub async fn broadcast_remote(&self, message: InvalidationMessage) -> Result<()> {
        if let Some(ref client) = self.redis_client {
            let json = serde_json::to_string(&message)?;
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::AsyncCommands::publish::<_, _, ()>(&mut conn, CACHE_INVALIDATION_CHANNEL, json)
                .await?;
            debug!(node_id = %self.node_id, ?message, "published cache invalidation message");
        }
        Ok(())
    }

    pub async fn invalidate_share(&self, share_id: &str) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::Share {
            share_id: share_id.to_string(),
        })
        .await
    }

    pub async fn invalidate_object_keys(&self, tenant: &str, object_keys: &[String]) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::ObjectKeys {
            tenant: tenant.to_string(),
            object_keys: object_keys.to_vec(),
        })
        .await
    }
}

impl std::fmt::Debug for CacheInvalidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidationService")
            .field("redis_enabled", &self.redis_client.is_some())
            .field("node_id", &self.node_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_message_serializes_with_type_tag() {
        let msg = InvalidationMessage::Share {
            share_id: "sh_abc".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"share\""));
        let decoded: InvalidationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, decoded);
    }

    #[tokio::test]
    async fn broadcast_without_redis_is_noop() {
        let service = CacheInvalidationService::new(None, "test-node".to_string());
        service.broadcast_remote(InvalidationMessage::All).await.unwrap();
    }
}
