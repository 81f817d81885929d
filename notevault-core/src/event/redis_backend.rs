//! Redis Pub/Sub event-bus backend, the same transport `cache::invalidation`
//! uses for cache fan-out, here carrying domain events instead.

use async_trait::async_trait;
use redis::Client;

use super::EventBus;
use crate::{Error, Result};

pub struct RedisEventBus {
    client: Client,
}

impl RedisEventBus {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(Error::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::AsyncCommands::publish::<_, _, ()>(&mut conn, topic, payload).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_malformed_url() {
        assert!(RedisEventBus::connect("not-a-url").is_err());
    }
}
