use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// Accumulated cursor fault flags.
///
/// A fault is sticky diagnostic state, not an abort switch: a faulted cursor
/// keeps capacity-checking every subsequent operation individually, so one
/// failed read can never corrupt later offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorFault(u8);

impl CursorFault {
    /// No faults recorded.
    pub const NONE: Self = Self(0);
    /// An operation would have crossed the end of the buffer.
    pub const CAPACITY_EXCEEDED: Self = Self(1 << 0);

    /// Returns whether every bit of `other` is set in `self`.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns whether no fault has been recorded.
    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }

    /// Accumulates the bits of `other` into `self`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for CursorFault {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CursorFault {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CursorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear() {
            write!(f, "none")
        } else {
            write!(f, "capacity_exceeded")
        }
    }
}

/// Errors that can occur during cursor read/write operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// The operation needed more bytes than remain in the buffer
    #[error("Cursor operation needs {needed} bytes but only {remaining} remain (capacity {capacity})")]
    CapacityExceeded {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    /// A seek targeted an offset beyond the buffer's capacity
    #[error("Seek to offset {offset} is beyond capacity {capacity}")]
    SeekOutOfBounds {
        offset: usize,
        capacity: usize,
    },
}

#[cfg(test)]
mod fault_tests {
    use super::CursorFault;

    #[test]
    fn starts_clear() {
        let fault = CursorFault::default();
        assert!(fault.is_clear());
        assert!(!fault.contains(CursorFault::CAPACITY_EXCEEDED));
    }

    #[test]
    fn accumulates() {
        let mut fault = CursorFault::NONE;
        fault |= CursorFault::CAPACITY_EXCEEDED;
        assert!(!fault.is_clear());
        assert!(fault.contains(CursorFault::CAPACITY_EXCEEDED));
    }

    #[test]
    fn insert_is_sticky() {
        let mut fault = CursorFault::NONE;
        fault.insert(CursorFault::CAPACITY_EXCEEDED);
        fault.insert(CursorFault::NONE);
        assert!(fault.contains(CursorFault::CAPACITY_EXCEEDED));
    }
}
