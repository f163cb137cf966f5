//! OpenTSDB-compatible ingestion server
//!
//! Runs the HTTP write front door against an in-memory storage engine
//! stand-in. Production deployments wire [`IngestService`] to a real
//! engine instead.
//!
//! # Endpoints
//!
//! - `POST /api/put` - OpenTSDB put (JSON object or array, gzip honored)
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `TSDB_INGEST_CONFIG` environment variable (path to TOML file)
//! 2. `./tsdb-ingest.toml` in the current directory
//! 3. Default configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Start with defaults (listens on 0.0.0.0:4242)
//! ./server
//!
//! # Write one data point
//! curl -X POST http://localhost:4242/api/put \
//!   -H "Content-Type: application/json" \
//!   -d '{"metric":"sys.cpu.user","timestamp":1346846400,"value":18,"tags":{"host":"web01"}}'
//!
//! # Write a gzip-compressed batch
//! echo '[{"metric":"a","value":1},{"metric":"b","value":2}]' | gzip | \
//!   curl -X POST http://localhost:4242/api/put \
//!     -H "Content-Encoding: gzip" --data-binary @-
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use tsdb_ingest::config::Config;
use tsdb_ingest::ingest::{router, IngestService};
use tsdb_ingest::storage::MemoryEngine;

/// Load configuration from file or environment
fn load_config() -> Config {
    if let Ok(path) = std::env::var("TSDB_INGEST_CONFIG") {
        match Config::from_file(&path) {
            Ok(mut config) => {
                info!(path = %path, "Loaded configuration from file");
                config.apply_env_overrides();
                return config;
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to load config file, using defaults");
            }
        }
    }

    if let Ok(mut config) = Config::from_file("tsdb-ingest.toml") {
        info!("Loaded configuration from tsdb-ingest.toml");
        config.apply_env_overrides();
        return config;
    }

    info!("Using default configuration");
    Config::from_env()
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tsdb_ingest=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    info!("tsdb-ingest server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    config
        .validate()
        .map_err(|e| format!("invalid configuration: {}", e))?;
    info!("Listen address: {}", config.server.listen_addr);
    info!("Max body size: {} bytes", config.ingest.max_body_size);
    info!(
        "Max concurrent inserts: {}",
        config.ingest.max_concurrent_inserts
    );

    let engine = Arc::new(MemoryEngine::new());
    let service = Arc::new(IngestService::new(engine, config.ingest.clone()));
    let app = router(service);

    let addr: SocketAddr = config.server.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
