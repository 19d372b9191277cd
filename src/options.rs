//! Engine configuration.
//!
//! [`EngineOptions`] carries the knobs a driver hands to the engine when
//! building chunks and pipelines: the default chunk capacity used by
//! producers and operators that allocate fresh buffers, and buffer-pool
//! behavior. Options are builder-style and cheap to clone.

use crate::pool::{BufferPool, DEFAULT_MAX_PER_KEY};

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

/// Tunable engine parameters.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    chunk_capacity: usize,
    pool_enabled: bool,
    pool_max_per_key: usize,
}

impl EngineOptions {
    /// Options with engine defaults.
    pub fn new() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            pool_enabled: true,
            pool_max_per_key: DEFAULT_MAX_PER_KEY,
        }
    }

    /// Set the default row capacity for freshly allocated chunks.
    pub fn chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Enable or disable buffer pooling.
    pub fn pool_enabled(mut self, enabled: bool) -> Self {
        self.pool_enabled = enabled;
        self
    }

    /// Bound each pool free-list to `max` buffers.
    pub fn pool_max_per_key(mut self, max: usize) -> Self {
        self.pool_max_per_key = max;
        self
    }

    /// The configured chunk capacity.
    pub fn get_chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Whether pooling is enabled.
    pub fn is_pool_enabled(&self) -> bool {
        self.pool_enabled
    }

    /// The configured per-key pool bound.
    pub fn get_pool_max_per_key(&self) -> usize {
        self.pool_max_per_key
    }

    /// Build a buffer pool per these options; `None` when pooling is
    /// disabled.
    pub fn build_pool(&self) -> Option<BufferPool> {
        self.pool_enabled
            .then(|| BufferPool::with_max_per_key(self.pool_max_per_key))
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}
