//! OpenTSDB-compatible HTTP ingestion pipeline
//!
//! The write-path front door of the storage engine: accepts batches of
//! data points in OpenTSDB put JSON, normalizes them, and streams them
//! into the engine's write API.
//!
//! # Pipeline
//!
//! ```text
//! [Admission] → [PushContext pool] → [Bounded read] → [Row parse]
//!      → [Timestamp normalize] → [Label project / batch write] → [Flush]
//! ```
//!
//! Every stage is all-or-nothing at batch granularity: a failure
//! anywhere guarantees zero rows were committed for that request. The
//! pooled context is released on every exit path.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsdb_ingest::config::IngestConfig;
//! use tsdb_ingest::ingest::IngestService;
//! use tsdb_ingest::storage::MemoryEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(MemoryEngine::new());
//! let service = IngestService::new(engine, IngestConfig::default());
//!
//! let body = br#"{"metric":"sys.cpu.user","value":18,"tags":{"host":"web01"}}"#;
//! let rows = service.ingest(body, false).await?;
//! assert_eq!(rows, 1);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod limiter;
pub mod normalize;
pub mod pool;
pub mod reader;
pub mod row;

pub use http::router;
pub use limiter::ConcurrencyLimiter;
pub use pool::{ContextPool, PushContext};
pub use row::{Row, RowBatch, Tag};

use std::sync::Arc;

use crate::config::{available_parallelism, IngestConfig};
use crate::error::IngestError;
use crate::metrics;
use crate::storage::{Label, StorageEngine, WriteBuffer};

/// The ingestion service
///
/// Holds the context pool, admission limiter, configuration and the
/// storage engine handle. Constructed once at process start and shared
/// across all request workers; there is no package-level state.
pub struct IngestService<S: StorageEngine> {
    storage: Arc<S>,
    pool: ContextPool<S::Buffer>,
    limiter: ConcurrencyLimiter,
    config: IngestConfig,
}

impl<S: StorageEngine> IngestService<S> {
    /// Create a service backed by `storage`
    pub fn new(storage: Arc<S>, config: IngestConfig) -> Self {
        Self {
            storage,
            pool: ContextPool::new(available_parallelism()),
            limiter: ConcurrencyLimiter::new(config.max_concurrent_inserts),
            config,
        }
    }

    /// The service's ingestion configuration
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one put request body
    ///
    /// `gzip` reflects the request's `Content-Encoding`. Waits for an
    /// admission slot when the concurrency bound is reached. Returns
    /// the number of rows flushed.
    pub async fn ingest(&self, body: &[u8], gzip: bool) -> Result<usize, IngestError> {
        self.limiter.run(self.ingest_bounded(body, gzip)).await
    }

    async fn ingest_bounded(&self, body: &[u8], gzip: bool) -> Result<usize, IngestError> {
        metrics::READ_CALLS_TOTAL.inc();

        let mut ctx = self
            .pool
            .acquire(|| PushContext::new(self.storage.write_buffer()));
        let result = run_pipeline(&mut ctx, body, gzip, self.config.max_body_size).await;
        // Unconditional: the context goes back on success and on error
        self.pool.release(ctx);
        result
    }
}

/// Run the request-to-datapoint pipeline inside one pooled context
async fn run_pipeline<W: WriteBuffer>(
    ctx: &mut PushContext<W>,
    body: &[u8],
    gzip: bool,
    max_body_size: usize,
) -> Result<usize, IngestError> {
    if let Err(e) = reader::read_body(&mut ctx.body_buf, body, gzip, max_body_size) {
        metrics::READ_ERRORS_TOTAL.inc();
        return Err(e);
    }

    if let Err(e) = ctx.rows.unmarshal(&ctx.body_buf) {
        metrics::UNMARSHAL_ERRORS_TOTAL.inc();
        return Err(e);
    }

    normalize::normalize_timestamps(&mut ctx.rows.rows, normalize::now_secs());

    let row_count = ctx.rows.len();
    ctx.writer.reset(row_count);
    for row in &ctx.rows.rows {
        ctx.labels.clear();
        ctx.labels.push(Label::metric(row.metric.as_str()));
        for tag in &row.tags {
            ctx.labels
                .push(Label::new(tag.key.as_str(), tag.value.as_str()));
        }
        ctx.writer
            .write_data_point(None, &ctx.labels, row.timestamp, row.value);
    }

    // Accepted-for-flush volume, counted before flush completion
    metrics::ROWS_INSERTED_TOTAL.inc_by(row_count as u64);
    metrics::ROWS_PER_INSERT.observe(row_count as f64);

    if let Err(e) = ctx.writer.flush_bufs().await {
        metrics::FLUSH_ERRORS_TOTAL.inc();
        return Err(IngestError::Flush(e));
    }
    Ok(row_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEngine;

    fn service(engine: Arc<MemoryEngine>) -> IngestService<MemoryEngine> {
        IngestService::new(
            engine,
            IngestConfig {
                max_body_size: 4096,
                max_concurrent_inserts: 2,
            },
        )
    }

    #[tokio::test]
    async fn test_ingest_single_row() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        let rows = svc
            .ingest(
                br#"{"metric":"sys.cpu.user","timestamp":1346846400,"value":18,"tags":{"host":"web01"}}"#,
                false,
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let points = engine.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].labels.len(), 2);
        assert_eq!(points[0].labels[0], Label::metric("sys.cpu.user"));
        assert_eq!(points[0].labels[1], Label::new("host", "web01"));
        assert_eq!(points[0].timestamp_ms, 1346846400000);
        assert_eq!(points[0].value, 18.0);
    }

    #[tokio::test]
    async fn test_ingest_batch_preserves_row_order() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        svc.ingest(
            br#"[{"metric":"a","value":1},{"metric":"b","value":2}]"#,
            false,
        )
        .await
        .unwrap();

        let points = engine.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].labels[0].value, "a");
        assert_eq!(points[1].labels[0].value, "b");
    }

    #[tokio::test]
    async fn test_missing_timestamps_become_now_millis() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        let before_ms = normalize::now_secs() * 1_000;
        svc.ingest(br#"{"metric":"m","value":1}"#, false)
            .await
            .unwrap();
        let after_ms = (normalize::now_secs() + 1) * 1_000;

        let points = engine.points();
        assert_ne!(points[0].timestamp_ms, 0);
        assert!(points[0].timestamp_ms >= before_ms);
        assert!(points[0].timestamp_ms <= after_ms);
    }

    #[tokio::test]
    async fn test_oversized_body_writes_nothing() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = IngestService::new(
            Arc::clone(&engine),
            IngestConfig {
                max_body_size: 16,
                max_concurrent_inserts: 2,
            },
        );

        let body = br#"[{"metric":"a","value":1},{"metric":"b","value":2}]"#;
        let err = svc.ingest(body, false).await.unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { .. }));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_writes_nothing() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        let err = svc.ingest(b"{malformed", false).await.unwrap_err();
        assert!(matches!(err, IngestError::Unmarshal(_)));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_context_is_reused_across_requests() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        svc.ingest(br#"{"metric":"a","value":1}"#, false)
            .await
            .unwrap();
        assert_eq!(svc.pool.idle(), 1);

        // Second request drains the pool, then releases back
        svc.ingest(br#"{"metric":"b","value":2}"#, false)
            .await
            .unwrap();
        assert_eq!(svc.pool.idle(), 1);
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_context_released_after_error() {
        let engine = Arc::new(MemoryEngine::new());
        let svc = service(Arc::clone(&engine));

        let _ = svc.ingest(b"not json", false).await;
        assert_eq!(svc.pool.idle(), 1);
    }
}
