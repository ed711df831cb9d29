// Prometheus metrics for the commenter
//
// - Admissions, waits, rollbacks, cancellations, timeouts (counters)
// - Time spent waiting for admission (histogram)
// - Current window usage (gauge)
// - Comment outcomes (counter)

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGaugeVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Admission metrics
    pub static ref ADMISSIONS_TOTAL: IntCounter = IntCounter::new(
        "admissions_total",
        "Total number of granted admissions"
    ).expect("Failed to create admissions metric");

    pub static ref ADMISSION_WAITS_TOTAL: IntCounter = IntCounter::new(
        "admission_waits_total",
        "Total number of times an admission request had to wait"
    ).expect("Failed to create admission waits metric");

    pub static ref ADMISSION_ROLLBACKS_TOTAL: IntCounter = IntCounter::new(
        "admission_rollbacks_total",
        "Total number of admissions rolled back after a failed action"
    ).expect("Failed to create admission rollbacks metric");

    pub static ref ADMISSIONS_CANCELLED_TOTAL: IntCounter = IntCounter::new(
        "admissions_cancelled_total",
        "Total number of admission requests cancelled by shutdown"
    ).expect("Failed to create cancelled admissions metric");

    pub static ref ADMISSION_TIMEOUTS_TOTAL: IntCounter = IntCounter::new(
        "admission_timeouts_total",
        "Total number of admission requests that exceeded the wait ceiling"
    ).expect("Failed to create admission timeouts metric");

    pub static ref ADMISSION_WAIT_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new("admission_wait_seconds", "Time spent waiting before admission")
            .buckets(vec![0.0, 1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 21600.0, 86400.0]),
    ).expect("Failed to create admission wait metric");

    pub static ref WINDOW_USAGE: IntGaugeVec = IntGaugeVec::new(
        prometheus::Opts::new("window_usage", "Admissions currently counted per window"),
        &["window"]
    ).expect("Failed to create window usage metric");

    // Comment pipeline metrics
    pub static ref COMMENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("comments_total", "Processed posts by outcome"),
        &["status"]
    ).expect("Failed to create comments metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(ADMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_WAITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_ROLLBACKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSIONS_CANCELLED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_TIMEOUTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(WINDOW_USAGE.clone()))?;
    REGISTRY.register(Box::new(COMMENTS_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        // Registration fails on a second call in the same process
        let _ = init();
    }

    #[test]
    fn test_window_usage_gauge() {
        WINDOW_USAGE.with_label_values(&["test"]).set(3);
        assert_eq!(WINDOW_USAGE.with_label_values(&["test"]).get(), 3);
    }

    #[test]
    fn test_gather_metrics_text() {
        let _ = init();
        ADMISSIONS_TOTAL.inc();
        COMMENTS_TOTAL.with_label_values(&["published"]).inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("admissions_total"));
        assert!(text.contains("comments_total"));
    }
}
