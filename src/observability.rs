use std::net::SocketAddr;

// ── Refresh pipeline ────────────────────────────────────────────

/// Counter: week plans recomputed and installed.
pub const REFRESH_TOTAL: &str = "hallenplan_refresh_total";

/// Histogram: fetch + plan duration in seconds.
pub const REFRESH_DURATION_SECONDS: &str = "hallenplan_refresh_duration_seconds";

/// Counter: refreshes whose record-store read failed. The prior plan stays visible.
pub const REFRESH_FAILURES_TOTAL: &str = "hallenplan_refresh_failures_total";

/// Gauge: conflicting slots in the most recently installed plan.
pub const CONFLICTS: &str = "hallenplan_conflicts";

// ── Claim workflow ──────────────────────────────────────────────

/// Counter: claim attempts. Labels: outcome (created, taken, rejected, failed).
pub const CLAIMS_TOTAL: &str = "hallenplan_claims_total";

/// Counter: claims released.
pub const RELEASES_TOTAL: &str = "hallenplan_releases_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
/// An exporter that fails to bind is logged; the planner keeps running without it.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}
