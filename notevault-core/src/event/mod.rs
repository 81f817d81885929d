//! C4 Event Publisher (§4.4): publishes domain events to a configurable
//! backend, fire-and-forget — a publish failure is logged and counted, never
//! propagated to the operation that triggered it (§7).

mod nats;
mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::{EventBusBackend, EventBusConfig};
use crate::metrics::EVENT_PUBLISH_FAILURES_TOTAL;
use crate::models::{EventEnvelope, Topic};
use crate::{Error, Result};

pub use nats::NatsEventBus;
pub use redis_backend::RedisEventBus;

/// A backend able to carry a serialized event envelope to zero or more
/// subscribers. Implementors own their own connection lifecycle.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Best-effort startup probe (§4.4 "strict connect"): a 2-second dial
    /// against the broker, independent of whether any message is sent.
    async fn probe(&self) -> Result<()>;
}

/// Wraps a [`EventBus`] with topic gating, JSON encoding, and the
/// fire-and-forget failure accounting from §4.4/§7.
pub struct EventPublisher {
    backend: Arc<dyn EventBus>,
    config: EventBusConfig,
}

impl EventPublisher {
    pub async fn connect(config: &EventBusConfig) -> Result<Self> {
        let backend: Arc<dyn EventBus> = match config.backend {
            EventBusBackend::Redis => Arc::new(RedisEventBus::connect(&config.url)?),
            EventBusBackend::Nats => Arc::new(NatsEventBus::connect(&config.url).await?),
        };

        if config.strict_connect {
            tokio::time::timeout(Duration::from_secs(config.connect_timeout_seconds), backend.probe())
                .await
                .map_err(|_| Error::BackendUnavailable("event bus connect timed out".to_string()))??;
        }

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    #[must_use]
    pub fn with_backend(backend: Arc<dyn EventBus>, config: EventBusConfig) -> Self {
        Self { backend, config }
    }

    /// Publishes an event envelope. Per §4.4/§7 this never returns an error
    /// to force a caller-visible failure — it logs and increments
    /// `notevault_event_publish_failures_total` instead, and simply does
    /// nothing when the topic is disabled.
    pub async fn publish<T: serde::Serialize + Send + Sync>(&self, envelope: &EventEnvelope<T>) {
        let topic = envelope.header.topic.clone();

        if !self.config.is_topic_enabled(&topic) {
            return;
        }

        let payload = match serde_json::to_vec(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(topic = %topic, error = %e, "failed to encode event envelope");
                EVENT_PUBLISH_FAILURES_TOTAL.with_label_values(&[&topic]).inc();
                return;
            }
        };

        if let Err(e) = self.backend.publish_raw(&topic, payload).await {
            warn!(topic = %topic, error = %e, "event publish failed, swallowing per best-effort policy");
            EVENT_PUBLISH_FAILURES_TOTAL.with_label_values(&[&topic]).inc();
        }
    }

    pub async fn publish_topic<T: serde::Serialize + Send + Sync>(&self, topic: Topic, payload: T) {
        let envelope = EventEnvelope::new(topic, payload);
        self.publish(&envelope).await;
    }

    /// §6 `/health/mq`: a fresh reachability probe against the broker,
    /// independent of the startup `strict_connect` check.
    pub async fn health(&self) -> Result<()> {
        self.backend.probe().await
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").field("backend", &self.config.backend).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectEventPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBus {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EventBus for CountingBus {
        async fn publish_raw(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::BackendUnavailable("down".to_string()))
            } else {
                Ok(())
            }
        }

        async fn probe(&self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_payload() -> ObjectEventPayload {
        ObjectEventPayload {
            bucket: "b".to_string(),
            object_key: "tenant/file.bin".to_string(),
            version_id: None,
            etag: None,
            size: Some(10),
            content_type: None,
            file_name: Some("file.bin".to_string()),
            source: crate::models::EventSource::Upload,
            occurred_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_swallows_backend_failures() {
        let bus = Arc::new(CountingBus {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let publisher = EventPublisher::with_backend(bus.clone(), EventBusConfig::default());
        publisher.publish_topic(Topic::Stored, sample_payload()).await;
        assert_eq!(bus.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_topic_skips_publish() {
        let bus = Arc::new(CountingBus {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let mut config = EventBusConfig::default();
        config.topics_enabled.insert(Topic::Stored.as_str().to_string(), false);
        let publisher = EventPublisher::with_backend(bus.clone(), config);
        publisher.publish_topic(Topic::Stored, sample_payload()).await;
        assert_eq!(bus.calls.load(Ordering::SeqCst), 0);
    }
}
