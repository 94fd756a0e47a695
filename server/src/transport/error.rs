use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// Accumulated transport fault flags for one connection.
///
/// Flags are sticky diagnostics set by the I/O tasks and read from the
/// simulation thread after a disconnect, to tell a peer hang-up apart from a
/// protocol or budget violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportErrorCode(u16);

impl TransportErrorCode {
    pub const NONE: Self = Self(0);
    /// An inbound frame declared a payload larger than `max_receive_size`.
    pub const RECEIVE_BUFFER_EXCEEDED: Self = Self(1 << 0);
    /// Unconsumed received payload bytes exceeded `max_receive_queue_size`.
    pub const RECEIVE_QUEUE_EXCEEDED: Self = Self(1 << 1);
    /// The socket failed while reading.
    pub const SOCKET_RECEIVE: Self = Self(1 << 2);
    /// The socket failed while writing.
    pub const SOCKET_SEND: Self = Self(1 << 3);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }

    pub(crate) fn bits(&self) -> u16 {
        self.0
    }

    pub(crate) fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

impl BitOr for TransportErrorCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TransportErrorCode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear() {
            return write!(f, "none");
        }
        let mut first = true;
        let mut name = |flag: Self, label: &str, f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                first = false;
                write!(f, "{label}")?;
            }
            Ok(())
        };
        name(Self::RECEIVE_BUFFER_EXCEEDED, "receive_buffer_exceeded", f)?;
        name(Self::RECEIVE_QUEUE_EXCEEDED, "receive_queue_exceeded", f)?;
        name(Self::SOCKET_RECEIVE, "socket_receive", f)?;
        name(Self::SOCKET_SEND, "socket_send", f)
    }
}

/// Errors that can occur while setting up the listener
#[derive(Debug, Error)]
pub enum ListenError {
    /// Binding or configuring the listening socket failed
    #[error("Failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}
