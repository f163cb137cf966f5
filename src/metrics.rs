//! Prometheus metrics for the ingestion front door
//!
//! Counters track accepted-for-flush volume and errors by kind; they
//! are observability side channels and never affect request handling.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};

lazy_static! {
    /// Total rows accepted for flush
    pub static ref ROWS_INSERTED_TOTAL: IntCounter = register_int_counter!(
        "tsdb_ingest_rows_inserted_total",
        "Total rows accepted for flush to the storage engine"
    )
    .unwrap();

    /// Total ingestion pipeline invocations
    pub static ref READ_CALLS_TOTAL: IntCounter = register_int_counter!(
        "tsdb_ingest_read_calls_total",
        "Total ingestion pipeline invocations"
    )
    .unwrap();

    /// Total body read failures (transport, decompression, oversize)
    pub static ref READ_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "tsdb_ingest_read_errors_total",
        "Total request body read failures"
    )
    .unwrap();

    /// Total schema/JSON parse failures
    pub static ref UNMARSHAL_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "tsdb_ingest_unmarshal_errors_total",
        "Total request body parse failures"
    )
    .unwrap();

    /// Total storage flush failures
    pub static ref FLUSH_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "tsdb_ingest_flush_errors_total",
        "Total storage engine flush failures"
    )
    .unwrap();

    /// Distribution of rows per insert request
    pub static ref ROWS_PER_INSERT: Histogram = register_histogram!(
        "tsdb_ingest_rows_per_insert",
        "Rows per insert request",
        vec![1.0, 10.0, 100.0, 1_000.0, 10_000.0, 100_000.0]
    )
    .unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}
