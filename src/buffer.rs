//! Lock-free receive buffer recycling

use bytes::BytesMut;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free pool of equally-sized receive buffers.
///
/// The service client and server allocate one receive buffer per call /
/// per connection, sized `max_message_size + HEADER_SIZE`; the pool keeps
/// those allocations off the hot path.
pub struct BufferPool {
    pool: crossbeam_queue::ArrayQueue<BytesMut>,
    buffer_size: usize,
    hits: AtomicUsize,
}

impl BufferPool {
    /// Create a pool holding up to `max_buffers` buffers of `buffer_size` capacity.
    pub fn new(max_buffers: usize, buffer_size: usize) -> Self {
        Self {
            pool: crossbeam_queue::ArrayQueue::new(max_buffers),
            buffer_size,
            hits: AtomicUsize::new(0),
        }
    }

    /// Get a cleared buffer from the pool, or allocate a fresh one.
    pub fn try_get(&self) -> BytesMut {
        match self.pool.pop() {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => BytesMut::with_capacity(self.buffer_size),
        }
    }

    /// Return a buffer to the pool. Buffers that shrank below the pool's
    /// size class are dropped instead of recycled.
    pub fn try_put(&self, mut buf: BytesMut) {
        if buf.capacity() >= self.buffer_size {
            buf.clear();
            let _ = self.pool.push(buf);
        }
    }

    /// Pool statistics as (hits, buffers currently pooled).
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.pool.len())
    }
}
