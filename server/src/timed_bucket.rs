use std::time::{Duration, Instant};

/// A frame-bucketed rate limiter.
///
/// Time is divided into fixed frames; each frame grants `capacity` permits and
/// unused permits do not carry over. Used on the accept path to bound how many
/// sockets may enter the handshake per second.
pub struct TimedBucket {
    capacity: u32,
    frame: Duration,
    start: Instant,
    bucket: u64,
    count: u32,
}

impl TimedBucket {
    pub fn new(capacity: u32, frame: Duration) -> Self {
        Self {
            capacity,
            frame,
            start: Instant::now(),
            bucket: 0,
            count: 0,
        }
    }

    /// Grants one permit from the current frame, or refuses when the frame is
    /// exhausted.
    pub fn try_acquire(&mut self) -> bool {
        let bucket = (self.start.elapsed().as_millis() / self.frame.as_millis().max(1)) as u64;
        if bucket != self.bucket {
            self.bucket = bucket;
            self.count = 0;
        }
        if self.count >= self.capacity {
            return false;
        }
        self.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_capacity_is_enforced() {
        let mut bucket = TimedBucket::new(2, Duration::from_secs(3600));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn a_new_frame_refills() {
        let mut bucket = TimedBucket::new(1, Duration::from_millis(10));
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(25));
        assert!(bucket.try_acquire());
    }
}
