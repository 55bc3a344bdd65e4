//! Metrics collection and export for async pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use esox_asyncpool::{AsyncPool, FnFactory, PoolConfiguration};
/// use tokio_util::sync::CancellationToken;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let factory = FnFactory::new(|s: u8, _c: CancellationToken| async move {
///         Ok::<_, esox_asyncpool::BoxError>(s)
///     });
///     let pool = AsyncPool::new(PoolConfiguration::new().with_max_pool_size(2), factory).unwrap();
///
///     let _lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_rented, 1);
///     assert_eq!(metrics.total_created, 1);
///     assert_eq!(metrics.leased, 1);
///     assert_eq!(metrics.capacity_remaining, 1);
/// });
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total leases handed out
    pub total_rented: usize,

    /// Total leases released back to the pool
    pub total_released: usize,

    /// Total resources built by the factory
    pub total_created: usize,

    /// Factory invocations that failed
    pub factory_failures: usize,

    /// Rent calls that gave up while queued
    pub cancelled_waits: usize,

    /// Rent calls that hit the wait timeout
    pub timeouts: usize,

    /// Resources from before a clear that were dropped on release
    pub stale_discards: usize,

    /// Number of clears
    pub clears: usize,

    /// Current idle resources
    pub idle: usize,

    /// Current leased resources, including ones under construction
    pub leased: usize,

    /// Current queued rent calls
    pub waiters: usize,

    /// Resources that may still be constructed
    pub capacity_remaining: usize,

    /// Configured capacity
    pub max_capacity: usize,

    /// Leased share of capacity (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_rented".to_string(), self.total_rented.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("cancelled_waits".to_string(), self.cancelled_waits.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("stale_discards".to_string(), self.stale_discards.to_string());
        metrics.insert("clears".to_string(), self.clears.to_string());
        metrics.insert("idle".to_string(), self.idle.to_string());
        metrics.insert("leased".to_string(), self.leased.to_string());
        metrics.insert("waiters".to_string(), self.waiters.to_string());
        metrics.insert("capacity_remaining".to_string(), self.capacity_remaining.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("asyncpool_resources_idle", "Current idle resources", metrics.idle),
            ("asyncpool_resources_leased", "Current leased resources", metrics.leased),
            ("asyncpool_waiters", "Current queued rent calls", metrics.waiters),
            (
                "asyncpool_capacity_remaining",
                "Resources that may still be constructed",
                metrics.capacity_remaining,
            ),
        ];
        for (name, help, value) in gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, &value.to_string());
        }
        Self::push_metric(
            &mut output,
            "asyncpool_utilization",
            "Leased share of capacity",
            "gauge",
            &labels,
            &format!("{:.2}", metrics.utilization),
        );

        let counters = [
            ("asyncpool_rented_total", "Total leases handed out", metrics.total_rented),
            ("asyncpool_released_total", "Total leases released", metrics.total_released),
            ("asyncpool_created_total", "Total resources constructed", metrics.total_created),
            ("asyncpool_factory_failures_total", "Failed constructions", metrics.factory_failures),
            ("asyncpool_cancelled_waits_total", "Cancelled queued rents", metrics.cancelled_waits),
            ("asyncpool_timeouts_total", "Timed out queued rents", metrics.timeouts),
            ("asyncpool_stale_discards_total", "Resources dropped after a clear", metrics.stale_discards),
            ("asyncpool_clears_total", "Pool clears", metrics.clears),
        ];
        for (name, help, value) in counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal counters, bumped without taking the pool lock
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_rented: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_created: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub cancelled_waits: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub stale_discards: AtomicUsize,
    pub clears: AtomicUsize,
}

/// Gauges read under the pool lock
pub(crate) struct Gauges {
    pub idle: usize,
    pub leased: usize,
    pub waiters: usize,
    pub capacity_remaining: usize,
    pub max_capacity: usize,
}

impl MetricsTracker {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, gauges: Gauges) -> PoolMetrics {
        let utilization = if gauges.max_capacity > 0 {
            gauges.leased as f64 / gauges.max_capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_rented: self.total_rented.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            cancelled_waits: self.cancelled_waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            idle: gauges.idle,
            leased: gauges.leased,
            waiters: gauges.waiters,
            capacity_remaining: gauges.capacity_remaining,
            max_capacity: gauges.max_capacity,
            utilization,
        }
    }
}
