use std::time::{Duration, Instant};

/// Wall-clock remainder below this is burned in a spin loop instead of a
/// sleep, which on most platforms over-shoots by a scheduler quantum.
const PRECISION: Duration = Duration::from_millis(2);

/// How the tick loop relates simulated time to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStrategy {
    /// Always wait the full interval between ticks. Under load the simulation
    /// falls behind real time and never catches up.
    FixedTick,
    /// Wait only the elapsed-adjusted remainder; when behind, advance up to
    /// `max_delta_batches` intervals in one tick to catch up.
    Realtime,
}

/// Paces the simulation loop at a fixed interval.
pub struct Ticker {
    interval: Duration,
    strategy: TickStrategy,
    max_delta_batches: u32,
    deadline: Instant,
}

impl Ticker {
    pub fn new(interval: Duration, strategy: TickStrategy, max_delta_batches: u32) -> Self {
        Self {
            interval,
            strategy,
            max_delta_batches: max_delta_batches.max(1),
            deadline: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next tick boundary and returns how many intervals the
    /// simulation should advance (1 except for realtime catch-up).
    pub fn wait_next(&mut self) -> u32 {
        match self.strategy {
            TickStrategy::FixedTick => {
                precise_sleep(Instant::now() + self.interval);
                self.deadline = Instant::now() + self.interval;
                1
            }
            TickStrategy::Realtime => {
                let now = Instant::now();
                if now < self.deadline {
                    precise_sleep(self.deadline);
                    self.deadline += self.interval;
                    return 1;
                }
                // behind: batch whole missed intervals into this tick
                let behind = now.duration_since(self.deadline);
                let missed = (behind.as_nanos() / self.interval.as_nanos().max(1)) as u32;
                let batches = (missed + 1).min(self.max_delta_batches);
                self.deadline += self.interval * batches;
                batches
            }
        }
    }
}

/// Sleeps to within [`PRECISION`] of `deadline`, then spins the rest.
fn precise_sleep(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining > PRECISION {
            std::thread::sleep(remaining - PRECISION);
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_tick_waits_the_full_interval() {
        let mut ticker = Ticker::new(Duration::from_millis(20), TickStrategy::FixedTick, 1);
        let start = Instant::now();
        assert_eq!(ticker.wait_next(), 1);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn realtime_batches_catch_up_when_behind() {
        let mut ticker = Ticker::new(Duration::from_millis(5), TickStrategy::Realtime, 3);
        // fall several intervals behind
        std::thread::sleep(Duration::from_millis(40));
        let batches = ticker.wait_next();
        assert!(batches > 1 && batches <= 3, "batches = {batches}");
    }

    #[test]
    fn realtime_single_steps_when_on_schedule() {
        let mut ticker = Ticker::new(Duration::from_millis(10), TickStrategy::Realtime, 4);
        assert_eq!(ticker.wait_next(), 1);
        assert_eq!(ticker.wait_next(), 1);
    }
}
