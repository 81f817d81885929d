//! Prometheus metrics exposed via the boundary crate's `/metrics` route
//! (§10.3). Scoped to what the orchestration core itself can observe:
//! operation outcomes, S3 call latency, event-publish failures, and cache
//! hit rate.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry,
};

pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Per-component operation outcomes, labeled by component (`c1`..`c10`),
/// operation name, and `ok`/`error`.
pub static OPERATIONS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        Opts::new("notevault_operations_total", "Total orchestration operations by outcome"),
        &["component", "operation", "outcome"],
        REGISTRY.clone()
    )
    .expect("failed to register notevault_operations_total")
});

/// S3-compatible gateway call latency, labeled by operation.
pub static S3_CALL_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> =
    std::sync::LazyLock::new(|| {
        HistogramVec::new(
            HistogramOpts::new("notevault_s3_call_duration_seconds", "Object store call latency")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )
        .and_then(|m| {
            REGISTRY.register(Box::new(m.clone()))?;
            Ok(m)
        })
        .expect("failed to register notevault_s3_call_duration_seconds")
    });

/// Best-effort event publish failures, labeled by topic (§4.4, §7).
pub static EVENT_PUBLISH_FAILURES_TOTAL: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("notevault_event_publish_failures_total", "Event publish failures by topic"),
            &["topic"],
            REGISTRY.clone()
        )
        .expect("failed to register notevault_event_publish_failures_total")
    });

/// L1/L2 cache hits and misses, labeled by cache name (`share`, `kv`) and
/// tier (`l1`, `l2`).
pub static CACHE_LOOKUPS_TOTAL: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("notevault_cache_lookups_total", "Cache lookups by outcome"),
            &["cache", "tier", "outcome"],
            REGISTRY.clone()
        )
        .expect("failed to register notevault_cache_lookups_total")
    });

pub mod database {
    use super::{register_int_gauge_with_registry, IntGauge, REGISTRY};

    pub static DB_POOL_SIZE_MAX: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "notevault_db_pool_size_max",
            "Configured maximum database connection pool size",
            REGISTRY.clone()
        )
        .expect("failed to register notevault_db_pool_size_max")
    });

    pub static DB_CONNECTIONS_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "notevault_db_connections_active",
            "Active (non-idle) database connections",
            REGISTRY.clone()
        )
        .expect("failed to register notevault_db_connections_active")
    });

    pub static DB_CONNECTIONS_IDLE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "notevault_db_connections_idle",
            "Idle database connections",
            REGISTRY.clone()
        )
        .expect("failed to register notevault_db_connections_idle")
    });
}

/// Renders the registry in the Prometheus text exposition format.
pub fn render() -> anyhow::Result<String> {
    use prometheus::{Encoder, TextEncoder};
    let mut buf = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_render() {
        OPERATIONS_TOTAL.with_label_values(&["c6", "upload", "ok"]).inc();
        let rendered = render().unwrap();
        assert!(rendered.contains("notevault_operations_total"));
    }
}
