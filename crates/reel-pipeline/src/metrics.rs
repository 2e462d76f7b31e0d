//! Prometheus metrics for the pipeline.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "shotreel_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "shotreel_jobs_completed_total";
    pub const CONTINUITY_FALLBACKS_TOTAL: &str = "shotreel_continuity_fallbacks_total";
    pub const ASSEMBLY_RUNS_TOTAL: &str = "shotreel_assembly_runs_total";
    pub const ASSEMBLY_DURATION_SECONDS: &str = "shotreel_assembly_duration_seconds";
}

/// Install a Prometheus recorder serving `/metrics` on `addr`.
///
/// Must be called within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Record a job accepted for generation.
pub fn record_job_submitted(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_job_completed(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a take that fell back to the shot reference image.
pub fn record_continuity_fallback() {
    counter!(names::CONTINUITY_FALLBACKS_TOTAL).increment(1);
}

/// Record one assembly run.
pub fn record_assembly(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ASSEMBLY_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::ASSEMBLY_DURATION_SECONDS, &labels).record(duration_secs);
}
