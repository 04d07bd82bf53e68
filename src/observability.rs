use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── Engine outcomes ─────────────────────────────────────────────

/// Counter: reservation mutations. Labels: operation, status.
pub const RESERVATIONS_TOTAL: &str = "worqplace_reservations_total";

/// Counter: rejected mutations. Labels: reason.
pub const ADMISSION_REJECTIONS_TOTAL: &str = "worqplace_admission_rejections_total";

/// Histogram: availability query latency in seconds.
pub const AVAILABILITY_QUERY_SECONDS: &str = "worqplace_availability_query_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Counter: events committed to the journal.
pub const JOURNAL_RECORDS_TOTAL: &str = "worqplace_journal_records_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
