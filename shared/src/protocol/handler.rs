use tether_cursor::{Pod, PodSlice};

use crate::data::DataRegistry;

/// A handler's decision at the start of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchControl {
    /// Read the next message for this handler.
    Read,
    /// Skip this batch without consuming a message.
    Skip,
    /// Abort the whole decode.
    Abort,
}

/// A borrowed view of one entity data record inside a receive buffer.
///
/// The payload borrows the buffer being decoded and is valid only for the
/// duration of the [`BatchHandler::data`] call it is passed to; handlers
/// that need the value past that call must decode or copy it.
pub struct DataRecord<'a> {
    type_id: u8,
    payload: &'a [u8],
    span_len: Option<u16>,
}

impl<'a> DataRecord<'a> {
    pub(crate) fn scalar(type_id: u8, payload: &'a [u8]) -> Self {
        Self {
            type_id,
            payload,
            span_len: None,
        }
    }

    pub(crate) fn span(type_id: u8, payload: &'a [u8], len: u16) -> Self {
        Self {
            type_id,
            payload,
            span_len: Some(len),
        }
    }

    /// The registered type id this record carries.
    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    pub fn is_span(&self) -> bool {
        self.span_len.is_some()
    }

    /// The element count for span records.
    pub fn span_len(&self) -> Option<u16> {
        self.span_len
    }

    /// The raw payload bytes.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Decodes a scalar record as `T`, returning `None` when the record is a
    /// span or carries a different registered type.
    pub fn decode<T: Pod + 'static>(&self, registry: &DataRegistry) -> Option<T> {
        if self.is_span() || registry.id_of::<T>()? != self.type_id {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(self.payload))
    }

    /// Decodes a span record as a borrowed view of `T` elements, returning
    /// `None` when the record is scalar or carries a different type.
    pub fn decode_span<T: Pod + 'static>(&self, registry: &DataRegistry) -> Option<PodSlice<'a, T>> {
        let len = self.span_len?;
        if registry.id_of::<T>()? != self.type_id {
            return None;
        }
        PodSlice::from_bytes(self.payload, len as usize)
    }
}

/// Receives the contents of decoded batches.
///
/// Handlers are invoked in registration order. Returning `false` from any
/// callback (or [`BatchControl::Abort`] from `begin_batch`) aborts the whole
/// decode; the batch is then treated as undelivered.
pub trait BatchHandler: Send {
    /// Called once per batch before any message dispatch.
    fn begin_batch(
        &mut self,
        world_id: i32,
        batch_id: u16,
        local_time: i64,
        remote_time: i64,
    ) -> BatchControl;

    /// A chunk of entity ids the sender no longer includes in this
    /// connection's view.
    fn remove_entities(&mut self, entity_ids: PodSlice<'_, i32>) -> bool {
        let _ = entity_ids;
        true
    }

    /// Called before the data records of one updated entity.
    fn begin_entity(&mut self, entity_id: i32) -> bool {
        let _ = entity_id;
        true
    }

    /// One data record of the current entity. `record` borrows the receive
    /// buffer and is only valid during this call.
    fn data(&mut self, entity_id: i32, record: &DataRecord<'_>) -> bool {
        let _ = (entity_id, record);
        true
    }

    /// Called after this handler's message has been dispatched.
    fn end_batch(&mut self, batch_id: u16) -> bool {
        let _ = batch_id;
        true
    }
}
