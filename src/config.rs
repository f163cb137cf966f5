//! Configuration for the ingestion front door
//!
//! TOML configuration with sensible defaults and environment variable
//! overrides. The server binary looks for a file via `TSDB_INGEST_CONFIG`,
//! then `./tsdb-ingest.toml`, then falls back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Maximum decoded request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Maximum number of insert pipelines running concurrently
    ///
    /// Invocations beyond the bound queue rather than being rejected;
    /// under overload latency rises before availability suffers.
    #[serde(default = "default_max_concurrent_inserts")]
    pub max_concurrent_inserts: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Enable the Prometheus metrics endpoint
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:4242".to_string()
}
fn default_max_body_size() -> usize {
    32 * 1024 * 1024
}
fn default_max_concurrent_inserts() -> usize {
    available_parallelism() * 2
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

/// Number of available processing units, with a conservative fallback
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
            max_concurrent_inserts: default_max_concurrent_inserts(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("TSDB_INGEST_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(size) = std::env::var("TSDB_INGEST_MAX_BODY_SIZE") {
            if let Ok(s) = size.parse() {
                self.ingest.max_body_size = s;
            }
        }
        if let Ok(n) = std::env::var("TSDB_INGEST_MAX_CONCURRENT_INSERTS") {
            if let Ok(n) = n.parse() {
                self.ingest.max_concurrent_inserts = n;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_addr.is_empty() {
            return Err("listen_addr cannot be empty".to_string());
        }
        if self.ingest.max_body_size == 0 {
            return Err("max_body_size must be > 0".to_string());
        }
        if self.ingest.max_concurrent_inserts == 0 {
            return Err("max_concurrent_inserts must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:4242");
        assert_eq!(config.ingest.max_body_size, 32 * 1024 * 1024);
        assert!(config.ingest.max_concurrent_inserts > 0);
        assert!(config.monitoring.metrics_enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad = Config::default();
        bad.ingest.max_body_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.ingest.max_concurrent_inserts = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ingest]
            max_body_size = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.ingest.max_body_size, 1024);
        assert_eq!(config.server.listen_addr, "0.0.0.0:4242");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("TSDB_INGEST_MAX_BODY_SIZE", "4096");
        let config = Config::from_env();
        assert_eq!(config.ingest.max_body_size, 4096);
        std::env::remove_var("TSDB_INGEST_MAX_BODY_SIZE");
    }
}
