mod channel;
mod error;
mod tcp;

pub use channel::ChannelTransport;
pub use error::{ListenError, TransportErrorCode};
pub use tcp::{FramedListener, IncomingConnection, TcpTransport};

use tether_shared::PooledBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Disconnected,
}

/// A connection-oriented byte transport carrying length-prefixed frames.
///
/// `send` takes a finished batch buffer whose first 4 bytes are the payload
/// length; `receive` yields payload buffers with the prefix already stripped.
/// Implementations queue internally; all buffers travel through the shared
/// [`BufferPool`](tether_shared::BufferPool) and are returned by dropping
/// them, whichever side ends up holding them.
pub trait Transport: Send {
    /// Queues one outbound frame. Returns `false` when the connection is no
    /// longer able to send; the buffer is reclaimed either way.
    fn send(&self, buffer: PooledBuffer) -> bool;

    /// Drains every received payload into `out`, in arrival order.
    fn receive(&self, out: &mut Vec<PooledBuffer>);

    fn state(&self) -> TransportState;

    fn errors(&self) -> TransportErrorCode;

    /// Tears the connection down and reclaims queued buffers. Idempotent.
    fn close(&self);
}
