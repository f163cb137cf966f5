//! Error types for the ingestion front door

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Ingestion error
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request ingestion errors
///
/// Each variant is scoped to a single request and is never fatal to the
/// process. A failure at any stage means zero rows were committed for
/// that request.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Transport or decompression failure while reading the request body
    #[error("cannot read request body: {0}")]
    Read(#[source] std::io::Error),

    /// Decoded request body exceeds the configured size bound
    #[error("request body too large; must not exceed {max_size} bytes")]
    TooLarge {
        /// The configured maximum decoded body size
        max_size: usize,
    },

    /// Request body is not valid according to the OpenTSDB put schema
    #[error("cannot parse OpenTSDB put request: {0}")]
    Unmarshal(String),

    /// The storage engine rejected or failed to persist the batch
    #[error("cannot flush rows to storage: {0}")]
    Flush(#[from] FlushError),
}

/// Error returned by the storage engine when a batch flush fails
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FlushError(pub String);

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_display() {
        let err = IngestError::TooLarge { max_size: 1024 };
        assert_eq!(
            err.to_string(),
            "request body too large; must not exceed 1024 bytes"
        );

        let err = IngestError::Unmarshal("expected JSON object or array".to_string());
        assert!(err.to_string().contains("OpenTSDB put request"));
    }

    #[test]
    fn test_flush_error_wraps_into_ingest_error() {
        let err: IngestError = FlushError("write buffer full".to_string()).into();
        assert!(matches!(err, IngestError::Flush(_)));
        assert!(err.to_string().contains("write buffer full"));
    }

    #[test]
    fn test_ingest_error_wraps_into_crate_error() {
        let err: Error = IngestError::TooLarge { max_size: 1 }.into();
        assert!(matches!(err, Error::Ingest(_)));
    }
}
