//! HTTP endpoint for OpenTSDB put requests
//!
//! Exposes the ingestion pipeline as `POST /api/put`, honoring
//! `Content-Encoding: gzip` on the body, plus health and Prometheus
//! metrics endpoints. Per-request failures map to client or server
//! status codes; error logging is rate limited so a misbehaving client
//! cannot flood the log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::IngestError;
use crate::ingest::IngestService;
use crate::metrics;
use crate::storage::StorageEngine;

/// How many error log lines are allowed per reset window
const MAX_ERROR_LOGS_PER_WINDOW: u64 = 10;

/// How often the error log counter resets
const ERROR_LOG_RESET_INTERVAL: Duration = Duration::from_secs(5);

/// Rate limiter for per-request error logging
///
/// Allows a fixed number of log lines per window; a background task
/// resets the counter on a timer. Caps the side effect's frequency
/// without fully suppressing it.
pub struct LogLimiter {
    logged: AtomicU64,
    max_per_window: u64,
}

impl LogLimiter {
    /// Create a limiter allowing `max_per_window` lines between resets
    pub fn new(max_per_window: u64) -> Self {
        Self {
            logged: AtomicU64::new(0),
            max_per_window,
        }
    }

    /// Whether one more log line is allowed in the current window
    pub fn allow(&self) -> bool {
        self.logged.fetch_add(1, Ordering::Relaxed) < self.max_per_window
    }

    /// Reset the window counter
    pub fn reset(&self) {
        self.logged.store(0, Ordering::Relaxed);
    }

    /// Spawn the background reset task
    ///
    /// Must be called from within a tokio runtime. The task runs for
    /// the process lifetime.
    pub fn start_reset_task(self: &Arc<Self>, every: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                limiter.reset();
            }
        });
    }
}

/// Shared state for HTTP handlers
pub struct AppState<S: StorageEngine> {
    service: Arc<IngestService<S>>,
    log_limiter: Arc<LogLimiter>,
}

impl<S: StorageEngine> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            log_limiter: Arc::clone(&self.log_limiter),
        }
    }
}

/// Build the ingestion router
///
/// Must be called from within a tokio runtime (the log limiter's reset
/// task is spawned here).
pub fn router<S>(service: Arc<IngestService<S>>) -> Router
where
    S: StorageEngine + 'static,
    S::Buffer: 'static,
{
    let max_body_size = service.config().max_body_size;
    let log_limiter = Arc::new(LogLimiter::new(MAX_ERROR_LOGS_PER_WINDOW));
    log_limiter.start_reset_task(ERROR_LOG_RESET_INTERVAL);

    let state = AppState {
        service,
        log_limiter,
    };

    Router::new()
        .route("/api/put", post(handle_put::<S>))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        // Transport guard on the raw (possibly compressed) body; the
        // decoded size bound is enforced by the pipeline's reader. The
        // slack covers gzip framing overhead on incompressible bodies.
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(max_body_size.saturating_add(4096)))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// OpenTSDB put endpoint handler
async fn handle_put<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: StorageEngine + 'static,
    S::Buffer: 'static,
{
    let gzip = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    match state.service.ingest(&body, gzip).await {
        Ok(_rows) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            if state.log_limiter.allow() {
                warn!(error = %err, "put request rejected");
            }
            (status_for(&err), format!("{}\n", err)).into_response()
        }
    }
}

/// Map a per-request error to its HTTP status
fn status_for(err: &IngestError) -> StatusCode {
    match err {
        IngestError::Read(_) => StatusCode::BAD_REQUEST,
        IngestError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        IngestError::Unmarshal(_) => StatusCode::BAD_REQUEST,
        IngestError::Flush(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Health endpoint handler
async fn handle_health() -> Response {
    let health = serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(health)).into_response()
}

/// Prometheus metrics endpoint handler
async fn handle_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}
