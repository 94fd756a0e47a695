use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tether_shared::constants::FRAME_PREFIX_SIZE;
use tether_shared::{BufferPool, PooledBuffer};

use crate::transport::{Transport, TransportErrorCode, TransportState};

struct PairState {
    queues: [Mutex<VecDeque<PooledBuffer>>; 2],
    connected: AtomicBool,
    pool: Arc<BufferPool>,
}

/// One endpoint of an in-memory transport pair.
///
/// Frames sent on one endpoint arrive on the other with the 4-byte length
/// prefix stripped, exactly as the TCP transport delivers them. Used by tests
/// and standalone setups that connect a client engine directly to the server.
pub struct ChannelTransport {
    state: Arc<PairState>,
    side: usize,
}

impl ChannelTransport {
    /// Creates a connected endpoint pair sharing `pool`.
    pub fn pair(pool: &Arc<BufferPool>) -> (Self, Self) {
        let state = Arc::new(PairState {
            queues: [Mutex::new(VecDeque::new()), Mutex::new(VecDeque::new())],
            connected: AtomicBool::new(true),
            pool: Arc::clone(pool),
        });
        (
            Self {
                state: Arc::clone(&state),
                side: 0,
            },
            Self { state, side: 1 },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&self, buffer: PooledBuffer) -> bool {
        if !self.state.connected.load(Ordering::Acquire) {
            return false;
        }
        if buffer.len() < FRAME_PREFIX_SIZE {
            return false;
        }
        // deliver the payload the way the socket read path would: prefix gone
        let mut payload = self.state.pool.rent(buffer.len() - FRAME_PREFIX_SIZE);
        payload.copy_from_slice(&buffer[FRAME_PREFIX_SIZE..]);
        let peer = 1 - self.side;
        let mut queue = self.state.queues[peer]
            .lock()
            .expect("channel transport lock poisoned");
        queue.push_back(payload);
        true
    }

    fn receive(&self, out: &mut Vec<PooledBuffer>) {
        let mut queue = self.state.queues[self.side]
            .lock()
            .expect("channel transport lock poisoned");
        out.extend(queue.drain(..));
    }

    fn state(&self) -> TransportState {
        if self.state.connected.load(Ordering::Acquire) {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    fn errors(&self) -> TransportErrorCode {
        TransportErrorCode::NONE
    }

    fn close(&self) {
        if !self.state.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        // both directions drain; buffers drop back to the pool
        for queue in &self.state.queues {
            queue
                .lock()
                .expect("channel transport lock poisoned")
                .clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cross_with_the_prefix_stripped() {
        let pool = BufferPool::new();
        let (client, server) = ChannelTransport::pair(&pool);

        let payload = b"Hello, Network!";
        let mut frame = pool.rent(FRAME_PREFIX_SIZE + payload.len());
        frame[..4].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        frame[4..].copy_from_slice(payload);
        assert!(client.send(frame));

        let mut received = Vec::new();
        server.receive(&mut received);
        assert_eq!(received.len(), 1);
        assert_eq!(&received[0][..], payload);
    }

    #[test]
    fn close_disconnects_both_endpoints_and_reclaims_buffers() {
        let pool = BufferPool::new();
        let (client, server) = ChannelTransport::pair(&pool);

        let frame = pool.rent(8);
        assert!(client.send(frame));
        assert_eq!(pool.outstanding(), 1);

        server.close();
        server.close();
        assert_eq!(client.state(), TransportState::Disconnected);
        assert_eq!(server.state(), TransportState::Disconnected);
        assert_eq!(pool.outstanding(), 0);
        assert!(!client.send(pool.rent(8)));
        assert_eq!(pool.outstanding(), 0);
    }
}
