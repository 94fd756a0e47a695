use tether_cursor::{CursorError, ReadCursor, WriteCursor};

use crate::constants::BATCH_HEADER_SIZE;

/// The fixed 16-byte header at the front of every batch payload.
///
/// Written field by field through the cursor so the wire layout is
/// little-endian on every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHeader {
    pub world_id: i32,
    /// Strictly increasing per connection; the receiver accepts only
    /// `previous.wrapping_add(1)`.
    pub batch_id: u16,
    /// The highest batch id this sender has successfully decoded from the
    /// peer; drives the reliable replay mechanism.
    pub remote_ack_batch_id: u16,
    pub time: i64,
}

impl BatchHeader {
    pub const SIZE: usize = BATCH_HEADER_SIZE;

    pub fn write(&self, cursor: &mut WriteCursor<'_>) -> Result<(), CursorError> {
        cursor.write_i32(self.world_id)?;
        cursor.write_u16(self.batch_id)?;
        cursor.write_u16(self.remote_ack_batch_id)?;
        cursor.write_i64(self.time)
    }

    pub fn read(cursor: &mut ReadCursor<'_>) -> Result<Self, CursorError> {
        Ok(Self {
            world_id: cursor.read_i32()?,
            batch_id: cursor.read_u16()?,
            remote_ack_batch_id: cursor.read_u16()?,
            time: cursor.read_i64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sixteen_little_endian_bytes() {
        let header = BatchHeader {
            world_id: 3,
            batch_id: 0x0102,
            remote_ack_batch_id: 0x0304,
            time: 0x05060708,
        };
        let mut buffer = [0u8; BatchHeader::SIZE];
        let mut writer = WriteCursor::new(&mut buffer);
        header.write(&mut writer).unwrap();
        assert_eq!(writer.position(), BatchHeader::SIZE);
        assert_eq!(
            buffer,
            [3, 0, 0, 0, 0x02, 0x01, 0x04, 0x03, 0x08, 0x07, 0x06, 0x05, 0, 0, 0, 0]
        );

        let mut reader = ReadCursor::new(&buffer);
        assert_eq!(BatchHeader::read(&mut reader).unwrap(), header);
    }
}
