use thiserror::Error;

use tether_cursor::CursorError;

use crate::data::DataError;

/// Errors that can occur while decoding an inbound batch buffer.
///
/// Every variant aborts the decode; no handler ever observes a partially
/// valid batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A read ran past the end of the batch buffer (malformed or truncated
    /// payload)
    #[error("Batch buffer exhausted: {0}")]
    Cursor(#[from] CursorError),

    /// The batch carried a time older than the last accepted batch
    #[error("Batch time {received} is older than the last accepted time {last}")]
    StaleTime {
        received: i64,
        last: i64,
    },

    /// The batch id did not follow the last accepted id by exactly one
    #[error("Batch id {received} received, expected {expected}")]
    BatchIdSkew {
        received: u16,
        expected: u16,
    },

    /// The message tag is not one this decoder dispatches
    #[error("Unknown message tag {tag} received")]
    UnknownMessageTag {
        tag: u8,
    },

    /// An entity record referenced a type id that was never registered
    #[error("Unresolvable data type id {type_id} in entity record")]
    UnknownTypeId {
        type_id: u8,
    },

    /// A registered handler aborted the batch
    #[error("Handler aborted processing of batch {batch_id}")]
    HandlerAborted {
        batch_id: u16,
    },
}

/// Errors that can occur in the protocol engine's receive path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// The inbound batch failed to decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The header acknowledged a batch id that was never sent (or was
    /// already replayed past)
    #[error("Remote acknowledged batch {remote_ack} which is not in the in-flight set")]
    UnknownAck {
        remote_ack: u16,
    },

    /// The retained-buffer queue ran out before the replay reached the
    /// acknowledged batch id
    #[error("Ran out of retained buffers replaying toward acknowledged batch {remote_ack}")]
    AckReplayExhausted {
        remote_ack: u16,
    },

    /// A retained buffer failed to re-decode during ack replay
    #[error("Replay of sent batch failed at batch {batch_id}: {source}")]
    AckReplayFailed {
        batch_id: u16,
        source: DecodeError,
    },
}

/// Errors that can occur while assembling an outbound batch.
///
/// A failed send sends nothing; callers treat every variant as fatal to the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The batch outgrew the send buffer
    #[error("Send buffer exhausted: {0}")]
    Cursor(#[from] CursorError),

    /// An entity's record count exceeds what the wire format can carry
    #[error("Entity {entity_id} has {count} data records, more than the wire maximum of 65535")]
    TooManyRecords {
        entity_id: i32,
        count: usize,
    },

    /// Retaining this batch would exceed the remote-received byte budget,
    /// the hard bound on how far behind an acknowledgment may lag
    #[error(
        "Retaining {incoming} bytes would push the remote-received queue to {queued} bytes, over the budget of {budget}"
    )]
    AckBudgetExceeded {
        queued: usize,
        budget: usize,
        incoming: usize,
    },

    /// The outbound batch id is already awaiting acknowledgment
    #[error("Batch id {batch_id} is already in the in-flight set")]
    DuplicateBatchId {
        batch_id: u16,
    },

    /// A delta buffer write failed while assembling the batch
    #[error(transparent)]
    Data(#[from] DataError),
}
