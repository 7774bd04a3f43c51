//! Pool metrics
//!
//! Recorded through the `metrics` facade; the service installs the Prometheus
//! recorder. Without a recorder every call is a no-op.
//!
//! - `pool_allocations_total` (counter): label `outcome`
//! - `pool_allocate_duration_seconds` (histogram): label `outcome`
//! - `pool_accounts_created_total` (counter): label `result`
//! - `pool_returns_total` (counter): label `result`
//! - `pool_reconciled_total` (counter)

/// Histogram name for allocation latency, exported so the service can set buckets.
pub const ALLOCATE_DURATION_SECONDS: &str = "pool_allocate_duration_seconds";

/// Record one allocate call and how long it held the caller.
pub fn record_allocation(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("pool_allocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!(ALLOCATE_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record one provisioning attempt.
pub fn record_account_created(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("pool_accounts_created_total", "result" => result).increment(1);
}

/// Record one return call: `ok`, `ignored` (unknown or not in use) or `error`.
pub fn record_return(result: &'static str) {
    metrics::counter!("pool_returns_total", "result" => result).increment(1);
}

/// Record accounts moved from Cooldown back to Available by one sweep.
pub fn record_reconciled(count: usize) {
    metrics::counter!("pool_reconciled_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(ALLOCATE_DURATION_SECONDS.to_string()),
                &[0.01, 0.1, 1.0, 10.0],
            )
            .unwrap()
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_allocation("reused", 0.01);
        record_account_created(true);
        record_return("ok");
        record_reconciled(3);
    }

    #[test]
    fn allocation_outcomes_render_with_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_allocation("reused", 0.002);
        record_allocation("exhausted", 0.001);

        let output = handle.render();
        assert!(output.contains("pool_allocations_total"));
        assert!(output.contains("outcome=\"reused\""));
        assert!(output.contains("outcome=\"exhausted\""));
        assert!(output.contains("pool_allocate_duration_seconds_bucket"));
    }

    #[test]
    fn created_returns_and_reconciled_render() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_account_created(true);
        record_account_created(false);
        record_return("ignored");
        record_reconciled(2);

        let output = handle.render();
        assert!(output.contains("pool_accounts_created_total{result=\"success\"} 1"));
        assert!(output.contains("pool_accounts_created_total{result=\"failure\"} 1"));
        assert!(output.contains("pool_returns_total{result=\"ignored\"} 1"));
        assert!(output.contains("pool_reconciled_total 2"));
    }
}
