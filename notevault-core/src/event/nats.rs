//! NATS event-bus backend, the alternate transport from §4.4's
//! "configurable backend" requirement.

use async_trait::async_trait;
use async_nats::Client;

use super::EventBus;
use crate::{Error, Result};

pub struct NatsEventBus {
    client: Client,
}

impl NatsEventBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic.to_string(), payload.into())
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(())
    }
}
