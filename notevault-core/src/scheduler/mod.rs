//! C9 Scheduler (§4.9): cron-driven background jobs — trash autoclean twice
//! daily, plus a daily and monthly stats resync. Built on
//! `tokio-cron-scheduler` rather than a hand-rolled interval loop so cron
//! expressions stay declarative and testable in isolation from the jobs
//! themselves.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::service::{FileService, TrashService};
use crate::Result;

/// §4.9 jobs #2/#3: re-syncs every tenant's object store against the
/// metadata table. `day` scopes the resync to a single day (daily job);
/// `None` walks every object a tenant owns (monthly job).
async fn resync_all_tenants(
    files: &Arc<FileService>,
    trash: &Arc<TrashService>,
    day: Option<chrono::NaiveDate>,
) -> Result<usize> {
    let tenants = trash.distinct_tenants().await?;
    for tenant in &tenants {
        let (year, month, day) = day.map_or((None, None, None), |d| {
            (Some(chrono::Datelike::year(&d)), Some(chrono::Datelike::month(&d)), Some(chrono::Datelike::day(&d)))
        });
        match files.sync_tenant(tenant, year, month, day).await {
            Ok(result) => {
                if result.failed > 0 {
                    warn!(tenant, failed = result.failed, "object resync had per-object failures");
                }
            }
            Err(e) => error!(tenant, error = %e, "object resync failed for tenant"),
        }
    }
    Ok(tenants.len())
}

pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn start(
        config: &SchedulerConfig,
        trash: Arc<TrashService>,
        files: Arc<FileService>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| crate::Error::Internal(format!("failed to start job scheduler: {e}")))?;

        if !config.enabled {
            info!("scheduler disabled by configuration");
            return Ok(Self { inner: scheduler });
        }

        for expr in &config.trash_autoclean_cron {
            let trash = trash.clone();
            let job = Job::new_async(expr.as_str(), move |_uuid, _lock| {
                let trash = trash.clone();
                Box::pin(async move {
                    let result = trash.auto_clean_all_tenants().await;
                    for item in &result.results {
                        if !item.ok {
                            error!(tenant = %item.key, error = ?item.error, "trash autoclean failed for tenant");
                        }
                    }
                    info!(tenants = result.total, succeeded = result.success, "trash autoclean completed");
                })
            })
            .map_err(|e| crate::Error::InvalidArgument(format!("invalid cron expression {expr}: {e}")))?;
            scheduler
                .add(job)
                .await
                .map_err(|e| crate::Error::Internal(format!("failed to register job: {e}")))?;
        }

        {
            let files = files.clone();
            let trash = trash.clone();
            let job = Job::new_async(config.daily_resync_cron.as_str(), move |_uuid, _lock| {
                let files = files.clone();
                let trash = trash.clone();
                Box::pin(async move {
                    let yesterday = (chrono::Utc::now() - chrono::Duration::days(1)).date_naive();
                    match resync_all_tenants(&files, &trash, Some(yesterday)).await {
                        Ok(tenants) => info!(tenants, "daily object resync completed"),
                        Err(e) => error!(error = %e, "daily object resync failed"),
                    }
                })
            })
            .map_err(|e| crate::Error::InvalidArgument(format!("invalid daily resync cron: {e}")))?;
            scheduler
                .add(job)
                .await
                .map_err(|e| crate::Error::Internal(format!("failed to register job: {e}")))?;
        }

        {
            let files = files.clone();
            let trash = trash.clone();
            let job = Job::new_async(config.monthly_resync_cron.as_str(), move |_uuid, _lock| {
                let files = files.clone();
                let trash = trash.clone();
                Box::pin(async move {
                    match resync_all_tenants(&files, &trash, None).await {
                        Ok(tenants) => info!(tenants, "monthly object resync completed"),
                        Err(e) => error!(error = %e, "monthly object resync failed"),
                    }
                })
            })
            .map_err(|e| crate::Error::InvalidArgument(format!("invalid monthly resync cron: {e}")))?;
            scheduler
                .add(job)
                .await
                .map_err(|e| crate::Error::Internal(format!("failed to register job: {e}")))?;
        }

        scheduler
            .start()
            .await
            .map_err(|e| crate::Error::Internal(format!("failed to start job scheduler: {e}")))?;

        Ok(Self { inner: scheduler })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| crate::Error::Internal(format!("failed to shut down job scheduler: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cron_expressions_are_non_empty() {
        let config = SchedulerConfig::default();
        assert_eq!(config.trash_autoclean_cron.len(), 2);
        assert!(!config.daily_resync_cron.is_empty());
        assert!(!config.monthly_resync_cron.is_empty());
    }
}
