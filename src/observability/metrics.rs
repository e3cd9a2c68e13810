use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the inventory API.
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_resource_created(&self, resource: &str) {
        counter!("inventory_resources_created_total", "resource" => resource.to_string()).increment(1);
    }

    /// `outcome` is one of passthrough, executed, stored, replayed, conflict.
    pub fn record_idempotency_outcome(&self, resource: &str, outcome: &str) {
        counter!("idempotency_requests_total", "resource" => resource.to_string(), "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_idempotency_lock_wait(&self, duration_ms: f64) {
        histogram!("idempotency_lock_wait_duration_ms").record(duration_ms);
    }

    pub fn record_store_operation(&self, backend: &str, operation: &str, duration_ms: f64, success: bool) {
        counter!("idempotency_store_operations_total", "backend" => backend.to_string(), "operation" => operation.to_string(), "success" => success.to_string()).increment(1);
        histogram!("idempotency_store_operation_duration_ms", "backend" => backend.to_string(), "operation" => operation.to_string()).record(duration_ms);
    }

    pub fn record_store_purge(&self, purged: u64) {
        counter!("idempotency_store_purged_total").increment(purged);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

/// Describes all metrics for Prometheus.
fn describe_metrics() {
    describe_counter!("inventory_resources_created_total", Unit::Count, "Total number of products and items created");

    describe_counter!("idempotency_requests_total", Unit::Count, "Create requests seen by the idempotency gate, by outcome");
    describe_histogram!("idempotency_lock_wait_duration_ms", Unit::Milliseconds, "Time spent waiting for the per-key idempotency lock");
    describe_counter!("idempotency_store_operations_total", Unit::Count, "Idempotency store operations");
    describe_histogram!("idempotency_store_operation_duration_ms", Unit::Milliseconds, "Idempotency store operation latency in milliseconds");
    describe_counter!("idempotency_store_purged_total", Unit::Count, "Expired idempotency records removed by the sweep job");

    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!("http_request_duration_ms", Unit::Milliseconds, "HTTP request latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
