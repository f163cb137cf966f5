//! OpenTSDB-compatible HTTP write front door for a time-series storage
//! engine.
//!
//! Accepts batches of metric data points as OpenTSDB put JSON,
//! normalizes timestamps, and streams rows into the storage engine's
//! write API. Built to sustain many small requests per second with
//! bounded memory (size-capped decompression and reads), bounded
//! concurrency (admission control), and aggressive per-request object
//! reuse.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod ingest;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Storage engine write boundary
pub mod storage;

// Re-export main types
pub use config::{Config, IngestConfig};
pub use error::{Error, FlushError, IngestError, Result};
pub use ingest::{IngestService, Row, RowBatch};
pub use storage::{Label, MemoryEngine, StorageEngine, WriteBuffer};
