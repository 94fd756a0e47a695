use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

type Job = Box<dyn FnOnce() + Send>;

/// Marshals callbacks from worker threads onto the simulation thread.
///
/// Worker threads [`post`](Self::post) jobs; the simulation thread calls
/// [`drain`](Self::drain) once per tick and runs them in posting order.
/// [`invoke`](Self::invoke) runs a callback on the simulation thread and
/// blocks for its result, executing inline when the caller already is the
/// simulation thread.
#[derive(Default)]
pub struct Marshal {
    pending: Mutex<Vec<Job>>,
    sim_thread: Mutex<Option<ThreadId>>,
}

impl Marshal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the calling thread as the simulation thread. Called once at
    /// scheduler startup, before any `invoke`.
    pub fn bind(&self) {
        let mut sim_thread = self.sim_thread.lock().expect("marshal lock poisoned");
        *sim_thread = Some(thread::current().id());
    }

    pub fn is_sim_thread(&self) -> bool {
        let sim_thread = self.sim_thread.lock().expect("marshal lock poisoned");
        *sim_thread == Some(thread::current().id())
    }

    /// Queues a job for the next drain.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        let mut pending = self.pending.lock().expect("marshal lock poisoned");
        pending.push(Box::new(job));
    }

    /// Runs every queued job in posting order. Jobs posted while draining run
    /// on the next drain.
    pub fn drain(&self) {
        let jobs = {
            let mut pending = self.pending.lock().expect("marshal lock poisoned");
            std::mem::take(&mut *pending)
        };
        for job in jobs {
            job();
        }
    }

    /// Runs `job` on the simulation thread and returns its result, blocking
    /// the caller until the next drain when called from a worker thread.
    pub fn invoke<R: Send + 'static>(&self, job: impl FnOnce() -> R + Send + 'static) -> R {
        if self.is_sim_thread() {
            return job();
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.post(move || {
            let _ = tx.send(job());
        });
        rx.recv().expect("simulation thread dropped a pending invoke")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drain_runs_jobs_in_posting_order() {
        let marshal = Marshal::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for value in 0..4 {
            let order = Arc::clone(&order);
            marshal.post(move || order.lock().unwrap().push(value));
        }
        marshal.drain();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn invoke_runs_inline_on_the_simulation_thread() {
        let marshal = Marshal::new();
        marshal.bind();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inner = Arc::clone(&ran);
        let result = marshal.invoke(move || {
            ran_inner.fetch_add(1, Ordering::Relaxed);
            41 + 1
        });
        assert_eq!(result, 42);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
        // inline execution never queued anything
        marshal.drain();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn invoke_from_a_worker_blocks_until_drained() {
        let marshal = Arc::new(Marshal::new());
        marshal.bind();
        let worker_marshal = Arc::clone(&marshal);
        let worker = thread::spawn(move || worker_marshal.invoke(|| "done"));
        while !worker.is_finished() {
            marshal.drain();
            thread::yield_now();
        }
        assert_eq!(worker.join().unwrap(), "done");
    }
}
