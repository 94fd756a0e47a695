use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A shared pool of byte buffers bucketed by power-of-two capacity.
///
/// Transport and protocol code churn through short-lived buffers every tick;
/// renting from the pool keeps that churn off the allocator. A rented buffer
/// is returned by dropping its [`PooledBuffer`] guard, which makes the
/// return-exactly-once rule structural: double returns and leaks are both
/// unrepresentable.
pub struct BufferPool {
    buckets: Mutex<Vec<Vec<Vec<u8>>>>,
    outstanding: AtomicUsize,
}

const BUCKET_COUNT: usize = usize::BITS as usize + 1;

impl BufferPool {
    pub fn new() -> Arc<Self> {
        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        buckets.resize_with(BUCKET_COUNT, Vec::new);
        Arc::new(Self {
            buckets: Mutex::new(buckets),
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Rents a buffer of exactly `size` readable bytes (capacity may be
    /// larger). Contents are zeroed.
    pub fn rent(self: &Arc<Self>, size: usize) -> PooledBuffer {
        let class = Self::class_of(size);
        let reused = {
            let mut buckets = self.buckets.lock().expect("buffer pool lock poisoned");
            buckets[class].pop()
        };
        let mut data = reused.unwrap_or_else(|| Vec::with_capacity(1usize << class));
        data.clear();
        data.resize(size, 0);
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer {
            data,
            pool: Arc::clone(self),
        }
    }

    /// The number of rented buffers not yet returned. Used by tests to prove
    /// every abandonment path gives its buffer back.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    fn give_back(&self, data: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        let class = Self::class_of(data.capacity());
        let mut buckets = self.buckets.lock().expect("buffer pool lock poisoned");
        buckets[class].push(data);
    }

    fn class_of(size: usize) -> usize {
        size.next_power_of_two().trailing_zeros() as usize
    }
}

/// RAII guard over a rented buffer; returns it to the pool on drop.
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shrinks the readable length without touching capacity. Used after a
    /// batch is finalized into a buffer rented at a generous size.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.data));
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_and_drop_balance() {
        let pool = BufferPool::new();
        {
            let a = pool.rent(100);
            let b = pool.rent(5000);
            assert_eq!(a.len(), 100);
            assert_eq!(b.len(), 5000);
            assert_eq!(pool.outstanding(), 2);
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn reuses_returned_capacity() {
        let pool = BufferPool::new();
        let capacity = {
            let buffer = pool.rent(600);
            buffer.data.capacity()
        };
        let buffer = pool.rent(600);
        assert_eq!(buffer.data.capacity(), capacity);
    }

    #[test]
    fn rented_buffers_are_zeroed() {
        let pool = BufferPool::new();
        {
            let mut buffer = pool.rent(8);
            buffer[0] = 0xAB;
        }
        let buffer = pool.rent(8);
        assert_eq!(buffer[0], 0);
    }
}
