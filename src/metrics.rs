use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Outbound request metrics
    pub static ref REQUEST_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("analysis_request_attempts_total", "Total outbound request attempts by endpoint"),
        &["endpoint"]
    ).unwrap();

    pub static ref REQUEST_RETRIES: IntCounter = IntCounter::new(
        "analysis_request_retries_total",
        "Total retries performed after retryable failures"
    ).unwrap();

    pub static ref REQUEST_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("analysis_request_failures_total", "Terminal request failures by error kind"),
        &["kind"]
    ).unwrap();

    pub static ref REQUEST_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "analysis_request_duration_seconds",
            "Successful outbound request latency in seconds"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["endpoint"]
    ).unwrap();

    // Cache metrics
    pub static ref CACHE_HITS: IntCounterVec = IntCounterVec::new(
        Opts::new("analysis_cache_hits_total", "Result cache hits by operation kind"),
        &["operation"]
    ).unwrap();

    pub static ref CACHE_MISSES: IntCounterVec = IntCounterVec::new(
        Opts::new("analysis_cache_misses_total", "Result cache misses by operation kind"),
        &["operation"]
    ).unwrap();

    // Dedup metrics
    pub static ref DEDUP_COALESCED: IntCounter = IntCounter::new(
        "analysis_dedup_coalesced_total",
        "Requests that joined an already in-flight identical call"
    ).unwrap();

    // Fallback metrics
    pub static ref FALLBACK_RESULTS: IntCounter = IntCounter::new(
        "analysis_fallback_results_total",
        "Results served from the synthesized offline fallback"
    ).unwrap();
}

/// Register all engine collectors with the shared registry.
pub fn init_metrics() {
    REGISTRY.register(Box::new(REQUEST_ATTEMPTS.clone())).unwrap();
    REGISTRY.register(Box::new(REQUEST_RETRIES.clone())).unwrap();
    REGISTRY.register(Box::new(REQUEST_FAILURES.clone())).unwrap();
    REGISTRY.register(Box::new(REQUEST_LATENCY.clone())).unwrap();
    REGISTRY.register(Box::new(CACHE_HITS.clone())).unwrap();
    REGISTRY.register(Box::new(CACHE_MISSES.clone())).unwrap();
    REGISTRY.register(Box::new(DEDUP_COALESCED.clone())).unwrap();
    REGISTRY.register(Box::new(FALLBACK_RESULTS.clone())).unwrap();

    tracing::info!(
        "Metrics registry initialized with {} collectors",
        REGISTRY.gather().len()
    );
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
