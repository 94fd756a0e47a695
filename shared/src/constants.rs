/// The reserved type-tag sentinel marking a span record on the wire.
///
/// Must never be assigned to a registered data type.
pub const SPAN_FLAG: u8 = 0xFF;

/// The maximum number of registrable data types. Ids 0..=253 are assignable;
/// 254 types total keeps 0xFF free for [`SPAN_FLAG`] and 0xFE as headroom.
pub const MAX_DATA_TYPES: usize = (u8::MAX as usize) - 1;

/// The maximum number of data records a single entity may carry per buffer,
/// and the maximum element count of a span record (both wire `u16`s).
pub const MAX_RECORDS: usize = u16::MAX as usize;

/// Encoded size of a batch header on the wire.
pub const BATCH_HEADER_SIZE: usize = 16;

/// Size of the length prefix on every frame (and batch buffer).
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Size of the opaque open key a connecting socket presents before admission.
pub const OPEN_KEY_SIZE: usize = 32;
