//! Admission control for insert pipelines
//!
//! Bounds how many ingestion pipelines run concurrently to protect the
//! storage engine. Invocations beyond the bound queue on the semaphore
//! rather than being rejected: under overload latency rises before
//! availability is affected.

use tokio::sync::Semaphore;

/// Bounds the number of concurrently executing insert pipelines
pub struct ConcurrencyLimiter {
    permits: Semaphore,
}

impl ConcurrencyLimiter {
    /// Create a limiter allowing `max_concurrent` pipelines at once
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Run `work` once a concurrency slot is available
    ///
    /// Waits (queues) when all slots are taken. The slot is held for
    /// the whole execution of `work` and released on every exit path.
    pub async fn run<F>(&self, work: F) -> F::Output
    where
        F: std::future::Future,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("concurrency limiter semaphore closed");
        work.await
    }

    /// Number of currently available slots
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
