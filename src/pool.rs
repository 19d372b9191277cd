//! Buffer pooling.
//!
//! Column buffers churn at a steady rate while chunks stream through a
//! pipeline; the [`BufferPool`] keeps retired buffers on per-key
//! free-lists so producers can reuse allocations. Keys are
//! `(kind, capacity, nullable)`; each free-list is bounded. The pool is
//! strictly optional — nothing in the engine depends on it for
//! correctness — and is meant to live on a single thread alongside its
//! pipeline.

use crate::buffer::ColumnBuffer;
use crate::types::{DType, DTypeKind};
use crate::Result;
use std::collections::HashMap;

/// Default bound on each per-key free-list.
pub const DEFAULT_MAX_PER_KEY: usize = 50;

type PoolKey = (DTypeKind, usize, bool);

/// A single-threaded free-list pool of column buffers.
pub struct BufferPool {
    free: HashMap<PoolKey, Vec<ColumnBuffer>>,
    max_per_key: usize,
}

impl BufferPool {
    /// Create a pool with the default per-key bound.
    pub fn new() -> Self {
        Self::with_max_per_key(DEFAULT_MAX_PER_KEY)
    }

    /// Create a pool with an explicit per-key free-list bound.
    pub fn with_max_per_key(max_per_key: usize) -> Self {
        Self { free: HashMap::new(), max_per_key }
    }

    /// Take a recycled buffer matching `(dtype, capacity)` or allocate a
    /// fresh one.
    pub fn acquire(
        &mut self,
        dtype: DType,
        capacity: usize,
    ) -> Result<ColumnBuffer> {
        let key = (dtype.kind, capacity, dtype.nullable);
        if let Some(list) = self.free.get_mut(&key) {
            if let Some(buffer) = list.pop() {
                return Ok(buffer);
            }
        }
        ColumnBuffer::new(dtype, capacity)
    }

    /// Return a buffer to the pool. The buffer is recycled (bitmap
    /// zeroed, length reset); if the key's free-list is full the buffer
    /// is dropped instead.
    pub fn release(&mut self, mut buffer: ColumnBuffer) {
        buffer.recycle();
        let key = (buffer.kind(), buffer.capacity(), buffer.dtype().nullable);
        let list = self.free.entry(key).or_default();
        if list.len() < self.max_per_key {
            list.push(buffer);
        }
    }

    /// Total number of pooled buffers across all keys.
    pub fn pooled_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::types::Scalar;

    #[test]
    fn test_acquire_release_reuses() {
        let mut pool = BufferPool::new();
        let mut buffer = pool.acquire(DType::int32(), 16).unwrap();
        buffer.append(Scalar::Int(1)).unwrap();
        pool.release(buffer);
        assert_eq!(pool.pooled_count(), 1);

        let buffer = pool.acquire(DType::int32(), 16).unwrap();
        assert_eq!(buffer.len(), 0);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn test_key_separates_nullable() {
        let mut pool = BufferPool::new();
        pool.release(ColumnBuffer::new(DType::int32(), 16).unwrap());
        // Nullable request must not receive the non-nullable buffer.
        let buffer = pool.acquire(DType::int32().nullable(), 16).unwrap();
        assert_eq!(buffer.dtype(), DType::int32().nullable());
        assert_eq!(pool.pooled_count(), 1);
    }

    #[test]
    fn test_per_key_bound() {
        let mut pool = BufferPool::with_max_per_key(2);
        for _ in 0..5 {
            pool.release(ColumnBuffer::new(DType::int64(), 8).unwrap());
        }
        assert_eq!(pool.pooled_count(), 2);
    }
}
