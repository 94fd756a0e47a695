use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by the structural-change gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// A structural change was attempted while a parallel phase held the gate
    /// closed
    #[error("Structural changes are disallowed while a parallel phase is running")]
    ChangesDisallowed,
}

/// Guards structural mutation of the entity store and server lists.
///
/// The simulation thread closes the gate for the duration of each parallel
/// phase; every structural-change entry point (entity create/destroy, world
/// add/remove, connection admission) calls [`require_open`](Self::require_open)
/// and fails loudly instead of racing the phase.
#[derive(Default)]
pub struct MutationGate {
    closed: AtomicBool,
}

impl MutationGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Closes the gate for the lifetime of the returned scope guard.
    pub fn close(self: &Arc<Self>) -> ClosedScope {
        self.closed.store(true, Ordering::Release);
        ClosedScope {
            gate: Arc::clone(self),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn require_open(&self) -> Result<(), GateError> {
        if self.is_closed() {
            return Err(GateError::ChangesDisallowed);
        }
        Ok(())
    }
}

/// RAII scope holding the gate closed; reopens on drop.
pub struct ClosedScope {
    gate: Arc<MutationGate>,
}

impl Drop for ClosedScope {
    fn drop(&mut self) {
        self.gate.closed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_scope_reopens_on_drop() {
        let gate = MutationGate::new();
        assert!(gate.require_open().is_ok());
        {
            let _scope = gate.close();
            assert!(gate.is_closed());
            assert_eq!(gate.require_open(), Err(GateError::ChangesDisallowed));
        }
        assert!(gate.require_open().is_ok());
    }
}
