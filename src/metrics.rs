//! Prometheus metrics shared by the print queue and the HTTP layer.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Duration;

use crate::print_queue::JobStatus;

/// Metric name prefix for all agent metrics
const PREFIX: &str = "print_agent";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Print queue metrics
    pub static ref JOB_TRANSITIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_job_transitions_total"), "Job status transitions by target status"),
        &["status"]
    ).expect("Failed to create job_transitions_total metric");

    pub static ref RECONCILE_TICKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_reconcile_ticks_total"), "Spooler reconciliation ticks by outcome"),
        &["outcome"]
    ).expect("Failed to create reconcile_ticks_total metric");

    pub static ref TRACKED_JOBS: Gauge = Gauge::new(
        format!("{PREFIX}_tracked_jobs"),
        "Number of jobs currently tracked by the store"
    ).expect("Failed to create tracked_jobs metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (tests spawn several apps)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_TRANSITIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RECONCILE_TICKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TRACKED_JOBS.clone()));

    tracing::debug!("Metrics system initialized");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_job_transition(status: JobStatus) {
    JOB_TRANSITIONS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
}

pub fn record_reconcile_tick(outcome: &str) {
    RECONCILE_TICKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_tracked_jobs(count: usize) {
    TRACKED_JOBS.set(count as f64);
}
