//! C10 Storage Manager: the composition root. Owns every long-lived handle
//! (DB pool, object store gateway, cache backend, event publisher) and wires
//! C5-C9 on top of them. The boundary crate builds exactly one of these at
//! startup and shares it across requests behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::cache::{build_backend, CacheInvalidationService, CacheManager, KeyBuilder};
use crate::config::Config;
use crate::event::EventPublisher;
use crate::metrics::database as db_metrics;
use crate::repository::{FileRepository, ShareRepository};
use crate::resilience::timeout::DB_QUERY_TIMEOUT;
use crate::scheduler::Scheduler;
use crate::service::{FileService, StatsService, TrashService};
use crate::share::ShareRegistry;
use crate::storage::ObjectStoreGateway;
use crate::Result;

pub struct StorageManager {
    pub files: Arc<FileService>,
    pub trash: Arc<TrashService>,
    pub stats: Arc<StatsService>,
    pub shares: Arc<ShareRegistry>,
    pub events: Arc<EventPublisher>,
    pub storage: Arc<ObjectStoreGateway>,
    pub cache_invalidation: Arc<CacheInvalidationService>,
    db_pool: sqlx::PgPool,
    scheduler: Option<Scheduler>,
}

impl StorageManager {
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        config.validate().map_err(|errors| {
            crate::Error::InvalidArgument(format!("invalid configuration: {}", errors.join("; ")))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds).min(DB_QUERY_TIMEOUT))
            .connect(&config.database.url)
            .await?;

        db_metrics::DB_POOL_SIZE_MAX.set(i64::from(config.database.max_connections));
        info!(max_connections = config.database.max_connections, "database pool established");

        let storage = Arc::new(ObjectStoreGateway::new(&config.s3)?);

        let kv_backend = build_backend(&config.cache.backend, &config.redis.url)?;
        let key_builder = Arc::new(KeyBuilder::from_config(config));
        let cache = CacheManager::new(kv_backend, key_builder.clone());

        let redis_client = redis::Client::open(config.redis.url.as_str()).ok();
        let node_id = uuid::Uuid::new_v4().simple().to_string();
        let cache_invalidation = Arc::new(CacheInvalidationService::new(redis_client, node_id));
        cache_invalidation.start().await?;

        let events = Arc::new(EventPublisher::connect(&config.event_bus).await?);

        let file_repo = FileRepository::new(pool.clone());
        let share_repo = ShareRepository::new(pool.clone());

        let shares = Arc::new(ShareRegistry::new(share_repo, cache, Some(cache_invalidation.clone())));
        let files = Arc::new(FileService::new(storage.clone(), file_repo.clone(), events.clone(), shares.clone()));
        let trash =
            Arc::new(TrashService::new(file_repo.clone(), shares.clone(), config.scheduler.trash_retention_days));
        let stats = Arc::new(StatsService::new(file_repo));

        let scheduler = if config.scheduler.enabled {
            Some(Scheduler::start(&config.scheduler, trash.clone(), files.clone()).await?)
        } else {
            None
        };

        Ok(Self {
            files,
            trash,
            stats,
            shares,
            events,
            storage,
            cache_invalidation,
            db_pool: pool,
            scheduler,
        })
    }

    /// §5 "shutdown path": drains background jobs before returning.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cache_invalidation.stop();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await?;
        }
        Ok(())
    }

    /// Aggregate health: S3 reachability only, kept for callers that just
    /// want a single yes/no. §6's per-component contract uses the three
    /// methods below instead.
    pub async fn health(&self) -> Result<()> {
        self.health_s3().await
    }

    pub async fn health_db(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.db_pool)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }

    pub async fn health_s3(&self) -> Result<()> {
        self.storage.health(self.storage.default_bucket_name()).await
    }

    pub async fn health_mq(&self) -> Result<()> {
        self.events.health().await
    }
}
