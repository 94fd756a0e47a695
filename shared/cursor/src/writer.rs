use bytemuck::Pod;

use crate::error::{CursorError, CursorFault};

/// A bounds-checked write cursor over a mutable byte buffer.
///
/// Every operation checks that it fits within the buffer's capacity before
/// touching anything; a failed operation leaves both the cursor position and
/// the buffer contents unchanged and records a sticky [`CursorFault`].
///
/// Multi-byte integers are written little-endian so the produced bytes are
/// identical across host platforms. Single-byte values and `Pod` payloads are
/// copied as-is.
pub struct WriteCursor<'a> {
    buffer: &'a mut [u8],
    position: usize,
    faults: CursorFault,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            faults: CursorFault::NONE,
        }
    }

    /// The number of bytes written so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The accumulated fault flags. A set flag never clears.
    pub fn faults(&self) -> CursorFault {
        self.faults
    }

    /// Moves the cursor to an absolute offset.
    ///
    /// Used to rewind over a reserved-length placeholder once the final size
    /// is known. Seeking past the end of the buffer is a capacity fault.
    pub fn seek(&mut self, offset: usize) -> Result<(), CursorError> {
        if offset > self.buffer.len() {
            self.faults |= CursorFault::CAPACITY_EXCEEDED;
            return Err(CursorError::SeekOutOfBounds {
                offset,
                capacity: self.buffer.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), CursorError> {
        self.write_raw(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), CursorError> {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), CursorError> {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), CursorError> {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), CursorError> {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), CursorError> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a contiguous run of raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CursorError> {
        self.write_raw(bytes)
    }

    /// Writes a fixed-layout value by its byte representation.
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> Result<(), CursorError> {
        self.write_raw(bytemuck::bytes_of(value))
    }

    /// Writes a contiguous run of fixed-layout values.
    pub fn write_pod_slice<T: Pod>(&mut self, values: &[T]) -> Result<(), CursorError> {
        self.write_raw(bytemuck::cast_slice(values))
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CursorError> {
        let remaining = self.buffer.len() - self.position;
        if bytes.len() > remaining {
            self.faults |= CursorFault::CAPACITY_EXCEEDED;
            return Err(CursorError::CapacityExceeded {
                needed: bytes.len(),
                remaining,
                capacity: self.buffer.len(),
            });
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian() {
        let mut buffer = [0u8; 8];
        let mut cursor = WriteCursor::new(&mut buffer);
        cursor.write_u32(0x0102_0304).unwrap();
        assert_eq!(cursor.position(), 4);
        assert_eq!(&buffer[..4], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn capacity_boundary_leaves_cursor_unchanged() {
        let mut buffer = [0u8; 3];
        let mut cursor = WriteCursor::new(&mut buffer);
        let err = cursor.write_u32(42).unwrap_err();
        assert!(matches!(err, CursorError::CapacityExceeded { needed: 4, .. }));
        assert_eq!(cursor.position(), 0);
        assert!(cursor.faults().contains(CursorFault::CAPACITY_EXCEEDED));
        assert_eq!(buffer, [0, 0, 0]);
    }

    #[test]
    fn fault_is_informational_not_an_abort() {
        let mut buffer = [0u8; 4];
        let mut cursor = WriteCursor::new(&mut buffer);
        cursor.write_u16(1).unwrap();
        assert!(cursor.write_u32(2).is_err());
        // a later operation that fits still succeeds
        cursor.write_u16(3).unwrap();
        assert_eq!(cursor.position(), 4);
        assert!(cursor.faults().contains(CursorFault::CAPACITY_EXCEEDED));
    }

    #[test]
    fn seek_rewinds_for_length_patch() {
        let mut buffer = [0u8; 8];
        let mut cursor = WriteCursor::new(&mut buffer);
        cursor.write_u32(0).unwrap();
        cursor.write_u32(0xAABB_CCDD).unwrap();
        let end = cursor.position();
        cursor.seek(0).unwrap();
        cursor.write_u32(end as u32 - 4).unwrap();
        assert_eq!(&buffer[..4], &4u32.to_le_bytes());
    }

    #[test]
    fn seek_past_capacity_faults() {
        let mut buffer = [0u8; 2];
        let mut cursor = WriteCursor::new(&mut buffer);
        assert!(cursor.seek(3).is_err());
        assert!(cursor.faults().contains(CursorFault::CAPACITY_EXCEEDED));
    }
}
