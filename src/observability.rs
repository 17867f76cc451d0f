use std::net::SocketAddr;

// ── Allocation path ─────────────────────────────────────────────

/// Counter: `allocate` calls. Labels: outcome.
pub const ALLOCATIONS_TOTAL: &str = "seatwise_allocations_total";

/// Counter: commits that lost a race and moved on to the next candidate.
pub const ALLOCATION_RETRIES_TOTAL: &str = "seatwise_allocation_retries_total";

/// Histogram: `allocate` latency in seconds.
pub const ALLOCATION_DURATION_SECONDS: &str = "seatwise_allocation_duration_seconds";

/// Histogram: candidates returned by `find_candidates`.
pub const CANDIDATES_FOUND: &str = "seatwise_candidates_found";

// ── No-show reclaimer ───────────────────────────────────────────

/// Counter: reservations cancelled as no-shows.
pub const RECLAIMED_TOTAL: &str = "seatwise_reclaimed_total";

/// Counter: reclaim attempts that failed for a single reservation.
pub const RECLAIM_FAILURES_TOTAL: &str = "seatwise_reclaim_failures_total";

/// Histogram: duration of one reclaim scan in seconds.
pub const RECLAIM_RUN_DURATION_SECONDS: &str = "seatwise_reclaim_run_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "seatwise_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "seatwise_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "seatwise_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
