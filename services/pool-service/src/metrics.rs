//! Prometheus metrics exposition
//!
//! The pool crate records through the `metrics` facade; this module installs
//! the process-wide Prometheus recorder that `/metrics` renders.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use randomness_pool::metrics::ALLOCATE_DURATION_SECONDS;

/// Allocation latency buckets, from a cache hit on an idle account (1ms) up to
/// a slow provisioning call near the command timeout (60s).
const ALLOCATE_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Builder with histogram buckets configured, so allocation latency renders
/// `_bucket` lines rather than a summary.
fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(ALLOCATE_DURATION_SECONDS.to_string()),
            ALLOCATE_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}
