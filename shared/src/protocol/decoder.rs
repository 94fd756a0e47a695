use std::sync::Arc;

use tether_cursor::{CursorFault, ReadCursor};

use crate::constants::SPAN_FLAG;
use crate::data::DataRegistry;
use crate::protocol::batch_header::BatchHeader;
use crate::protocol::error::DecodeError;
use crate::protocol::handler::{BatchControl, BatchHandler, DataRecord};
use crate::protocol::message_type::MessageType;

/// Parses inbound batch buffers and dispatches their contents to registered
/// handlers.
///
/// Decode is all-or-nothing per batch: any failure aborts the parse and the
/// error is surfaced to the caller, which treats it as connection-fatal.
/// Cursor faults accumulate across batches for diagnostics.
pub struct BatchDecoder {
    registry: Arc<DataRegistry>,
    handlers: Vec<Box<dyn BatchHandler>>,
    world_id: i32,
    remote_batch_id: u16,
    remote_time: i64,
    faults: CursorFault,
}

impl BatchDecoder {
    pub fn new(registry: Arc<DataRegistry>) -> Self {
        Self {
            registry,
            handlers: Vec::new(),
            world_id: 0,
            remote_batch_id: 0,
            remote_time: 0,
            faults: CursorFault::NONE,
        }
    }

    /// Registers a handler; handlers run in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn BatchHandler>) {
        self.handlers.push(handler);
    }

    /// The world id of the last accepted batch.
    pub fn world_id(&self) -> i32 {
        self.world_id
    }

    /// The id of the last accepted batch.
    pub fn remote_batch_id(&self) -> u16 {
        self.remote_batch_id
    }

    /// The time of the last accepted batch.
    pub fn remote_time(&self) -> i64 {
        self.remote_time
    }

    /// Accumulated cursor faults from all decode attempts.
    pub fn faults(&self) -> CursorFault {
        self.faults
    }

    /// Decodes one batch buffer (excluding its 4-byte frame length; the
    /// buffer begins at the batch header).
    ///
    /// Header validation rejects before any state is mutated: a batch whose
    /// time regresses or whose id is not `last + 1` leaves the decoder
    /// untouched.
    pub fn try_receive(&mut self, buffer: &[u8], time: i64) -> Result<(), DecodeError> {
        let mut cursor = ReadCursor::new(buffer);
        let result = self.receive_with(&mut cursor, time);
        self.faults |= cursor.faults();
        result
    }

    fn receive_with(&mut self, cursor: &mut ReadCursor<'_>, time: i64) -> Result<(), DecodeError> {
        let header = BatchHeader::read(cursor)?;
        if header.time < self.remote_time {
            return Err(DecodeError::StaleTime {
                received: header.time,
                last: self.remote_time,
            });
        }
        let expected = self.remote_batch_id.wrapping_add(1);
        if header.batch_id != expected {
            return Err(DecodeError::BatchIdSkew {
                received: header.batch_id,
                expected,
            });
        }

        self.remote_time = header.time;
        self.remote_batch_id = header.batch_id;
        self.world_id = header.world_id;

        // skip leading ping/pong tags; unread the first tag that is neither
        while cursor.remaining() > 0 {
            let tag = cursor.read_u8()?;
            match MessageType::from_u8(tag) {
                Some(MessageType::Ping) | Some(MessageType::Pong) => {}
                _ => {
                    let tag_position = cursor.position() - 1;
                    cursor.seek(tag_position)?;
                    break;
                }
            }
        }

        let registry = Arc::clone(&self.registry);
        for handler in &mut self.handlers {
            match handler.begin_batch(header.world_id, header.batch_id, time, header.time) {
                BatchControl::Abort => {
                    return Err(DecodeError::HandlerAborted {
                        batch_id: header.batch_id,
                    })
                }
                BatchControl::Skip => continue,
                BatchControl::Read => {}
            }

            let tag = cursor.read_u8()?;
            match MessageType::from_u8(tag) {
                Some(MessageType::RemoveEntities) => {
                    dispatch_remove(cursor, handler.as_mut(), header.batch_id)?;
                }
                Some(MessageType::UpdateEntities) => {
                    dispatch_update(&registry, cursor, handler.as_mut(), header.batch_id)?;
                }
                _ => return Err(DecodeError::UnknownMessageTag { tag }),
            }

            if !handler.end_batch(header.batch_id) {
                return Err(DecodeError::HandlerAborted {
                    batch_id: header.batch_id,
                });
            }
        }
        Ok(())
    }
}

fn dispatch_remove(
    cursor: &mut ReadCursor<'_>,
    handler: &mut dyn BatchHandler,
    batch_id: u16,
) -> Result<(), DecodeError> {
    let count = cursor.read_u16()?;
    let entity_ids = cursor.read_pod_slice::<i32>(count as usize)?;
    if !handler.remove_entities(entity_ids) {
        return Err(DecodeError::HandlerAborted { batch_id });
    }
    Ok(())
}

fn dispatch_update(
    registry: &DataRegistry,
    cursor: &mut ReadCursor<'_>,
    handler: &mut dyn BatchHandler,
    batch_id: u16,
) -> Result<(), DecodeError> {
    // no entity count on the wire; entity blocks run to the end of the batch
    while cursor.remaining() > 0 {
        let entity_id = cursor.read_i32()?;
        let record_count = cursor.read_u16()?;
        if !handler.begin_entity(entity_id) {
            return Err(DecodeError::HandlerAborted { batch_id });
        }

        for _ in 0..record_count {
            let mut type_id = cursor.read_u8()?;
            let record = if type_id == SPAN_FLAG {
                type_id = cursor.read_u8()?;
                let span_len = cursor.read_u16()?;
                let info = registry
                    .get(type_id)
                    .ok_or(DecodeError::UnknownTypeId { type_id })?;
                let payload = cursor.read_bytes(info.size() * span_len as usize)?;
                DataRecord::span(type_id, payload, span_len)
            } else {
                let info = registry
                    .get(type_id)
                    .ok_or(DecodeError::UnknownTypeId { type_id })?;
                let payload = cursor.read_bytes(info.size())?;
                DataRecord::scalar(type_id, payload)
            };

            if !handler.data(entity_id, &record) {
                return Err(DecodeError::HandlerAborted { batch_id });
            }
        }
    }
    Ok(())
}
