use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tether_cursor::{CursorFault, ReadCursor, WriteCursor};

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::connection_config::ConnectionConfig;
use crate::constants::{FRAME_PREFIX_SIZE, MAX_RECORDS};
use crate::data::{DataRegistry, EntityDelta};
use crate::protocol::batch_header::BatchHeader;
use crate::protocol::decoder::BatchDecoder;
use crate::protocol::error::{DecodeError, ReceiveError, SendError};
use crate::protocol::handler::BatchHandler;
use crate::protocol::message_type::MessageType;

struct RemoteReceived {
    decoder: BatchDecoder,
    sent_ids: HashSet<u16>,
    sent_buffers: VecDeque<PooledBuffer>,
    queue_size: usize,
}

/// The per-connection batch protocol state machine.
///
/// Wraps a receive [`BatchDecoder`] and adds ping/pong scheduling, outbound
/// batch assembly, and the reliable remote-acknowledgment mechanism: when
/// reliability is enabled, every sent batch is retained (keyed by batch id)
/// until the peer's header acknowledges it, at which point the retained
/// bytes are replayed through a second decoder — reconstructing, byte for
/// byte, exactly what the remote side has consumed.
pub struct BatchProtocolEngine {
    registry: Arc<DataRegistry>,
    pool: Arc<BufferPool>,
    receiver: BatchDecoder,
    remote_received: Option<RemoteReceived>,

    send_buffer_size: usize,
    ping_interval_ms: i64,
    max_remote_received_queue_size: usize,

    last_ping_sent: i64,
    ping_pending: bool,
    send_pong: bool,
    batch_id: u16,
    latency: Option<i64>,
    send_faults: CursorFault,
}

impl BatchProtocolEngine {
    pub fn new(
        registry: Arc<DataRegistry>,
        pool: Arc<BufferPool>,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            receiver: BatchDecoder::new(Arc::clone(&registry)),
            registry,
            pool,
            remote_received: None,
            send_buffer_size: config.send_buffer_size,
            ping_interval_ms: config.ping_interval_ms,
            max_remote_received_queue_size: config.max_remote_received_queue_size,
            last_ping_sent: 0,
            ping_pending: false,
            send_pong: false,
            batch_id: 0,
            latency: None,
            send_faults: CursorFault::NONE,
        }
    }

    /// Registers a handler for inbound batches.
    pub fn add_receive_handler(&mut self, handler: Box<dyn BatchHandler>) {
        self.receiver.add_handler(handler);
    }

    /// Registers a handler for replayed remote-received batches. The first
    /// call enables reliability: sent batches are retained until
    /// acknowledged.
    pub fn add_remote_received_handler(&mut self, handler: Box<dyn BatchHandler>) {
        let state = self.remote_received.get_or_insert_with(|| RemoteReceived {
            decoder: BatchDecoder::new(Arc::clone(&self.registry)),
            sent_ids: HashSet::new(),
            sent_buffers: VecDeque::new(),
            queue_size: 0,
        });
        state.decoder.add_handler(handler);
    }

    pub fn remote_received_enabled(&self) -> bool {
        self.remote_received.is_some()
    }

    /// The id of the last batch assembled by [`try_send`](Self::try_send).
    pub fn batch_id(&self) -> u16 {
        self.batch_id
    }

    /// The world id of the last accepted inbound batch.
    pub fn world_id(&self) -> i32 {
        self.receiver.world_id()
    }

    /// Round-trip latency in milliseconds; `None` until the first pong.
    pub fn latency(&self) -> Option<i64> {
        self.latency
    }

    pub fn receive_faults(&self) -> CursorFault {
        self.receiver.faults()
    }

    pub fn send_faults(&self) -> CursorFault {
        self.send_faults
    }

    pub fn remote_received_faults(&self) -> CursorFault {
        self.remote_received
            .as_ref()
            .map(|state| state.decoder.faults())
            .unwrap_or(CursorFault::NONE)
    }

    /// The number of sent batches awaiting acknowledgment.
    pub fn retained_batch_count(&self) -> usize {
        self.remote_received
            .as_ref()
            .map(|state| state.sent_buffers.len())
            .unwrap_or(0)
    }

    /// The byte total of retained sent batches, counted against the
    /// remote-received budget.
    pub fn retained_queue_size(&self) -> usize {
        self.remote_received
            .as_ref()
            .map(|state| state.queue_size)
            .unwrap_or(0)
    }

    /// The id of the last batch the remote peer is known to have decoded.
    pub fn remote_consumed_batch_id(&self) -> u16 {
        self.remote_received
            .as_ref()
            .map(|state| state.decoder.remote_batch_id())
            .unwrap_or(0)
    }

    /// Releases every retained buffer back to the pool. Called when the
    /// connection closes.
    pub fn dispose(&mut self) {
        if let Some(state) = &mut self.remote_received {
            state.sent_buffers.clear();
            state.sent_ids.clear();
            state.queue_size = 0;
        }
    }

    /// Processes one inbound batch buffer (excluding its frame length).
    ///
    /// Handles the header's acknowledgment field, ping/pong bookkeeping,
    /// then delegates the whole buffer to the receive decoder.
    pub fn try_receive(&mut self, buffer: &[u8], time: i64) -> Result<(), ReceiveError> {
        let mut cursor = ReadCursor::new(buffer);
        let header = BatchHeader::read(&mut cursor).map_err(DecodeError::Cursor)?;

        if self.remote_received.is_some() {
            self.handle_remote_received(&header)?;
        }

        // peek leading tags; the receive decoder re-reads them itself
        while cursor.remaining() > 0 {
            let Ok(tag) = cursor.read_u8() else { break };
            match MessageType::from_u8(tag) {
                Some(MessageType::Ping) => self.send_pong = true,
                Some(MessageType::Pong) => {
                    if self.ping_pending {
                        self.ping_pending = false;
                        self.latency = Some(time - self.last_ping_sent);
                    }
                }
                _ => break,
            }
        }

        self.receiver.try_receive(buffer, time)?;
        Ok(())
    }

    /// Assembles the outbound batch for this tick and hands back a buffer
    /// sized exactly to its contents (frame length prefix included).
    ///
    /// `updated_entities` yields `(entity_id, newly_observed, delta)`
    /// triples; newly observed entities get the full persistent buffer,
    /// already-observing ones only the persistent-change delta, and both get
    /// event data. A failed send sends nothing.
    pub fn try_send<I>(
        &mut self,
        world_id: i32,
        time: i64,
        tick: u64,
        removed_entities: &[i32],
        updated_entities: I,
    ) -> Result<PooledBuffer, SendError>
    where
        I: IntoIterator<Item = (i32, bool, Arc<Mutex<EntityDelta>>)>,
    {
        let mut write_buffer = self.pool.rent(self.send_buffer_size);
        let total_len = {
            let mut cursor = WriteCursor::new(&mut write_buffer);
            let result =
                self.write_batch(&mut cursor, world_id, time, tick, removed_entities, updated_entities);
            self.send_faults |= cursor.faults();
            result?
        };

        let mut out = self.pool.rent(total_len);
        out.copy_from_slice(&write_buffer[..total_len]);
        drop(write_buffer);

        if let Some(state) = &mut self.remote_received {
            let new_size = state.queue_size + out.len();
            if new_size > self.max_remote_received_queue_size {
                return Err(SendError::AckBudgetExceeded {
                    queued: new_size,
                    budget: self.max_remote_received_queue_size,
                    incoming: out.len(),
                });
            }
            if !state.sent_ids.insert(self.batch_id) {
                return Err(SendError::DuplicateBatchId {
                    batch_id: self.batch_id,
                });
            }
            state.queue_size = new_size;
            // retain a copy: the transport returns the sent buffer to the
            // pool on completion, while this one lives until acknowledged
            let mut retained = self.pool.rent(out.len());
            retained.copy_from_slice(&out);
            state.sent_buffers.push_back(retained);
        }
        Ok(out)
    }

    fn write_batch<I>(
        &mut self,
        cursor: &mut WriteCursor<'_>,
        world_id: i32,
        time: i64,
        tick: u64,
        removed_entities: &[i32],
        updated_entities: I,
    ) -> Result<usize, SendError>
    where
        I: IntoIterator<Item = (i32, bool, Arc<Mutex<EntityDelta>>)>,
    {
        // length placeholder, patched below
        cursor.write_u32(0)?;

        self.batch_id = self.batch_id.wrapping_add(1);
        let header = BatchHeader {
            world_id,
            batch_id: self.batch_id,
            remote_ack_batch_id: self.receiver.remote_batch_id(),
            time,
        };
        header.write(cursor)?;

        if !self.ping_pending && time - self.last_ping_sent > self.ping_interval_ms {
            self.last_ping_sent = time;
            self.ping_pending = true;
            cursor.write_u8(MessageType::Ping as u8)?;
        }
        if self.send_pong {
            self.send_pong = false;
            cursor.write_u8(MessageType::Pong as u8)?;
        }

        // removed ids are chunked, never truncated
        for chunk in removed_entities.chunks(MAX_RECORDS) {
            cursor.write_u8(MessageType::RemoveEntities as u8)?;
            cursor.write_u16(chunk.len() as u16)?;
            cursor.write_pod_slice(chunk)?;
        }

        cursor.write_u8(MessageType::UpdateEntities as u8)?;
        for (entity_id, newly_observed, delta) in updated_entities {
            let mut delta = delta.lock().expect("entity delta lock poisoned");
            delta.clear_transient(tick);

            let chosen = if newly_observed {
                &delta.persistent
            } else {
                &delta.persistent_change
            };
            let record_count = chosen.records_written() + delta.event.records_written();
            if record_count > MAX_RECORDS {
                return Err(SendError::TooManyRecords {
                    entity_id,
                    count: record_count,
                });
            }

            cursor.write_i32(entity_id)?;
            cursor.write_u16(record_count as u16)?;
            if newly_observed {
                delta.persistent.write_to(cursor)?;
            } else {
                delta.persistent_change.write_to(cursor)?;
            }
            delta.event.write_to(cursor)?;
        }

        let total = cursor.position();
        cursor.seek(0)?;
        cursor.write_u32((total - FRAME_PREFIX_SIZE) as u32)?;
        Ok(total)
    }

    /// Advances the remote-received decoder to the acknowledged batch id by
    /// replaying retained sent buffers oldest-first, releasing each one as
    /// it is consumed.
    fn handle_remote_received(&mut self, header: &BatchHeader) -> Result<(), ReceiveError> {
        let Some(state) = &mut self.remote_received else {
            return Ok(());
        };

        if header.remote_ack_batch_id == state.decoder.remote_batch_id() {
            return Ok(());
        }
        if !state.sent_ids.contains(&header.remote_ack_batch_id) {
            return Err(ReceiveError::UnknownAck {
                remote_ack: header.remote_ack_batch_id,
            });
        }

        while state.decoder.remote_batch_id() != header.remote_ack_batch_id {
            let Some(buffer) = state.sent_buffers.pop_front() else {
                return Err(ReceiveError::AckReplayExhausted {
                    remote_ack: header.remote_ack_batch_id,
                });
            };
            state.queue_size -= buffer.len();
            // replay past the frame prefix: the replay decoder must see
            // exactly the bytes the remote decoded
            state
                .decoder
                .try_receive(&buffer[FRAME_PREFIX_SIZE..], header.time)
                .map_err(|source| ReceiveError::AckReplayFailed {
                    batch_id: state.decoder.remote_batch_id().wrapping_add(1),
                    source,
                })?;
            state.sent_ids.remove(&state.decoder.remote_batch_id());
            // buffer drops here, returning to the pool
        }
        Ok(())
    }
}
