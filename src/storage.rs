//! Storage engine write boundary
//!
//! The ingestion pipeline is a pure client of the storage engine. The
//! engine hands out a per-batch [`WriteBuffer`]; the pipeline fills it
//! row by row and flushes it once per request. Indexing, compaction and
//! the on-disk format live behind this boundary and are not part of
//! this crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::FlushError;

/// A (key, value) pair attached to a data point
///
/// The metric name is encoded as the label with an empty key; storage
/// engines treat that pair as "the metric name" by convention. Label
/// order is significant and must match the order labels were projected
/// from the input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Label key; empty for the metric-name label
    pub key: String,
    /// Label value
    pub value: String,
}

impl Label {
    /// Create a label from a key and value
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create the metric-name label (empty key)
    pub fn metric(name: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            value: name.into(),
        }
    }
}

/// Per-batch write buffer handed out by a storage engine
///
/// Points accumulate across one request and become durable only when
/// [`flush_bufs`](WriteBuffer::flush_bufs) succeeds. A buffer is owned
/// by exactly one in-flight request at a time.
#[async_trait]
pub trait WriteBuffer: Send {
    /// Reset the buffer, dropping any buffered points
    ///
    /// `expected_rows` is a capacity hint for the upcoming batch; zero
    /// means unknown.
    fn reset(&mut self, expected_rows: usize);

    /// Buffer one data point
    ///
    /// `shard_hint` lets callers steer placement; `None` leaves the
    /// choice to the engine. `labels` must start with the metric-name
    /// label and preserve input tag order.
    fn write_data_point(
        &mut self,
        shard_hint: Option<u32>,
        labels: &[Label],
        timestamp_ms: i64,
        value: f64,
    );

    /// Hand the accumulated batch to the engine for durable ingestion
    ///
    /// Failure applies to the batch as a unit; no partial-flush
    /// semantics are assumed.
    async fn flush_bufs(&mut self) -> Result<(), FlushError>;
}

/// A storage engine that can hand out per-batch write buffers
pub trait StorageEngine: Send + Sync {
    /// The write buffer type this engine produces
    type Buffer: WriteBuffer;

    /// Create a fresh write buffer bound to this engine
    fn write_buffer(&self) -> Self::Buffer;
}

/// One data point as submitted to the storage engine
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    /// Ordered label list, metric-name label first
    pub labels: Vec<Label>,
    /// Timestamp in milliseconds since epoch
    pub timestamp_ms: i64,
    /// Sample value
    pub value: f64,
}

/// In-memory storage engine
///
/// Accumulates flushed points in process memory. Stands in for the
/// real engine in the demo server and in tests.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    points: Arc<Mutex<Vec<StoredPoint>>>,
}

impl MemoryEngine {
    /// Create an empty in-memory engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all durably flushed points, in arrival order
    pub fn points(&self) -> Vec<StoredPoint> {
        self.points.lock().clone()
    }

    /// Number of durably flushed points
    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    /// Whether no points have been flushed yet
    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }
}

impl StorageEngine for MemoryEngine {
    type Buffer = MemoryWriteBuffer;

    fn write_buffer(&self) -> MemoryWriteBuffer {
        MemoryWriteBuffer {
            buffered: Vec::new(),
            sink: Arc::clone(&self.points),
        }
    }
}

/// Write buffer for [`MemoryEngine`]
#[derive(Debug)]
pub struct MemoryWriteBuffer {
    buffered: Vec<StoredPoint>,
    sink: Arc<Mutex<Vec<StoredPoint>>>,
}

#[async_trait]
impl WriteBuffer for MemoryWriteBuffer {
    fn reset(&mut self, expected_rows: usize) {
        self.buffered.clear();
        self.buffered.reserve(expected_rows);
    }

    fn write_data_point(
        &mut self,
        _shard_hint: Option<u32>,
        labels: &[Label],
        timestamp_ms: i64,
        value: f64,
    ) {
        self.buffered.push(StoredPoint {
            labels: labels.to_vec(),
            timestamp_ms,
            value,
        });
    }

    async fn flush_bufs(&mut self) -> Result<(), FlushError> {
        self.sink.lock().append(&mut self.buffered);
        Ok(())
    }
}
