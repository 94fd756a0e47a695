use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Simulation clock state, advanced once per tick by the scheduler.
///
/// Readable from any thread; only the simulation thread advances it. `total_ms`
/// is the accumulated simulated time, which under the fixed-tick strategy may
/// lag wall-clock time.
#[derive(Default)]
pub struct SimTime {
    tick: AtomicU64,
    total_ms: AtomicI64,
    delta_ms: AtomicI64,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick number; 0 before the first advance.
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Accumulated simulated milliseconds.
    pub fn total_ms(&self) -> i64 {
        self.total_ms.load(Ordering::Relaxed)
    }

    /// Simulated milliseconds covered by the current tick.
    pub fn delta_ms(&self) -> i64 {
        self.delta_ms.load(Ordering::Relaxed)
    }

    /// Starts the next tick spanning `delta_ms` simulated milliseconds.
    pub fn advance(&self, delta_ms: i64) {
        self.tick.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(delta_ms, Ordering::Relaxed);
        self.delta_ms.store(delta_ms, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let time = SimTime::new();
        assert_eq!(time.tick(), 0);
        time.advance(50);
        time.advance(100);
        assert_eq!(time.tick(), 2);
        assert_eq!(time.total_ms(), 150);
        assert_eq!(time.delta_ms(), 100);
    }
}
