use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use once_cell::sync::Lazy;

use crate::TagSet;

const DEFAULT_POOL_CAPACITY: usize = 1024;

static GLOBAL_POOL: Lazy<Arc<Pool>> = Lazy::new(|| Arc::new(Pool::new(DEFAULT_POOL_CAPACITY)));

/// Reusable per-client buffers.
#[derive(Debug, Default)]
pub(crate) struct Parts {
    pub tags: TagSet,
    pub prefix: String,
}

impl Parts {
    fn clear(&mut self) {
        self.tags.clear();
        self.prefix.clear();
    }

    fn is_clear(&self) -> bool {
        self.tags.is_empty() && self.prefix.is_empty()
    }
}

/// A pool of reusable client buffers.
///
/// High-QPS request paths tend to create and close one [`XStats`](crate::XStats) per request. The pool recycles the
/// tag map and prefix allocations of closed clients so that new clients can pick them up instead of allocating.
///
/// Buffers are always cleared when they are released, before anything else can acquire them: a client acquired from
/// the pool never observes the tags or prefix of the client that used the buffers before it.
#[derive(Debug)]
pub struct Pool {
    free: ArrayQueue<Parts>,
}

impl Pool {
    /// Creates a new `Pool` holding at most `capacity` free entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self { free: ArrayQueue::new(capacity) }
    }

    /// Returns the process-wide pool.
    ///
    /// Clients created without an explicit pool recycle their buffers here.
    pub fn global() -> Arc<Pool> {
        Arc::clone(&GLOBAL_POOL)
    }

    /// Returns the number of free entries currently held by the pool.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn acquire(&self) -> Parts {
        self.free.pop().unwrap_or_default()
    }

    pub(crate) fn release(&self, mut parts: Parts) {
        parts.clear();
        debug_assert!(parts.is_clear());

        // A full pool simply lets the buffers drop.
        let _ = self.free.push(parts);
    }
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new(DEFAULT_POOL_CAPACITY)
    }
}
