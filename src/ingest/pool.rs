//! Per-request context pooling
//!
//! Every request needs the same scratch state: a decode buffer, a row
//! batch and a label-projection buffer plus the storage write-buffer
//! handle. Allocating these per request would dominate the write path
//! under production load, so contexts are pooled: a fixed-capacity
//! lock-free fast path sized to the number of processing units keeps
//! the common case allocation-free, and an unbounded mutex-guarded
//! free list absorbs bursts without retaining fast-path memory when
//! idle.

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;

use crate::ingest::row::RowBatch;
use crate::storage::{Label, WriteBuffer};

/// Reusable per-request scratch state
///
/// Exclusively owned by one in-flight request; returns to the pool
/// only through [`ContextPool::release`], which resets it first.
#[derive(Debug)]
pub struct PushContext<W> {
    /// Decoded request body
    pub body_buf: Vec<u8>,
    /// Rows parsed from the body
    pub rows: RowBatch,
    /// Label-projection buffer, rebuilt for every row
    pub labels: Vec<Label>,
    /// Storage engine write-buffer handle
    pub writer: W,
}

impl<W: WriteBuffer> PushContext<W> {
    /// Create a fresh context around a storage write buffer
    pub fn new(writer: W) -> Self {
        Self {
            body_buf: Vec::new(),
            rows: RowBatch::new(),
            labels: Vec::new(),
            writer,
        }
    }

    /// Reset all scratch state for reuse by the next request
    pub fn reset(&mut self) {
        self.body_buf.clear();
        self.rows.clear();
        self.labels.clear();
        self.writer.reset(0);
    }
}

/// Two-tier pool of [`PushContext`] objects
///
/// Safe for concurrent use without external locking. Acquire never
/// fails: an empty pool falls back to the supplied factory.
pub struct ContextPool<W> {
    fast: ArrayQueue<PushContext<W>>,
    overflow: Mutex<Vec<PushContext<W>>>,
}

impl<W: WriteBuffer> ContextPool<W> {
    /// Create a pool with a fast path of `fast_capacity` slots
    pub fn new(fast_capacity: usize) -> Self {
        Self {
            fast: ArrayQueue::new(fast_capacity.max(1)),
            overflow: Mutex::new(Vec::new()),
        }
    }

    /// Take an idle context, or build one with `make`
    pub fn acquire(&self, make: impl FnOnce() -> PushContext<W>) -> PushContext<W> {
        if let Some(ctx) = self.fast.pop() {
            return ctx;
        }
        if let Some(ctx) = self.overflow.lock().pop() {
            return ctx;
        }
        make()
    }

    /// Reset a context and return it to the idle set
    ///
    /// Must be called exactly once per acquire, on every exit path.
    pub fn release(&self, mut ctx: PushContext<W>) {
        ctx.reset();
        if let Err(ctx) = self.fast.push(ctx) {
            self.overflow.lock().push(ctx);
        }
    }

    /// Number of idle contexts currently held
    pub fn idle(&self) -> usize {
        self.fast.len() + self.overflow.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryEngine, StorageEngine};

    fn new_ctx(engine: &MemoryEngine) -> PushContext<<MemoryEngine as StorageEngine>::Buffer> {
        PushContext::new(engine.write_buffer())
    }

    #[test]
    fn test_acquire_on_empty_pool_allocates() {
        let engine = MemoryEngine::new();
        let pool = ContextPool::new(2);
        assert_eq!(pool.idle(), 0);

        let ctx = pool.acquire(|| new_ctx(&engine));
        assert!(ctx.body_buf.is_empty());
        assert!(ctx.rows.is_empty());
    }

    #[test]
    fn test_release_resets_context() {
        let engine = MemoryEngine::new();
        let pool = ContextPool::new(2);

        let mut ctx = pool.acquire(|| new_ctx(&engine));
        ctx.body_buf.extend_from_slice(b"leftover");
        ctx.rows
            .unmarshal(br#"{"metric":"m","value":1}"#)
            .unwrap();
        ctx.labels.push(Label::metric("m"));
        pool.release(ctx);

        let ctx = pool.acquire(|| new_ctx(&engine));
        assert!(ctx.body_buf.is_empty());
        assert_eq!(ctx.rows.len(), 0);
        assert!(ctx.labels.is_empty());
    }

    #[test]
    fn test_release_overflows_past_fast_path() {
        let engine = MemoryEngine::new();
        let pool = ContextPool::new(1);

        let a = pool.acquire(|| new_ctx(&engine));
        let b = pool.acquire(|| new_ctx(&engine));
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 2);

        // Both come back out without touching the factory
        let _a = pool.acquire(|| panic!("factory must not run"));
        let _b = pool.acquire(|| panic!("factory must not run"));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_is_shareable_across_threads() {
        use std::sync::Arc;

        let engine = Arc::new(MemoryEngine::new());
        let pool = Arc::new(ContextPool::new(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let ctx = pool.acquire(|| PushContext::new(engine.write_buffer()));
                        pool.release(ctx);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
