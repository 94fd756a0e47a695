use bytemuck::Pod;

use crate::error::{CursorError, CursorFault};
use crate::pod_slice::PodSlice;

/// A bounds-checked read cursor over an immutable byte buffer.
///
/// Mirrors [`WriteCursor`](crate::WriteCursor): a failed read leaves the
/// cursor position unchanged and records a sticky [`CursorFault`]. Borrowed
/// reads (`read_bytes`, `read_pod_slice`) hand out views into the underlying
/// buffer; their lifetime is tied to the buffer, never to the cursor, so a
/// decode pass can keep reading while a handler inspects an earlier view.
pub struct ReadCursor<'a> {
    buffer: &'a [u8],
    position: usize,
    faults: CursorFault,
}

impl<'a> ReadCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            faults: CursorFault::NONE,
        }
    }

    /// The number of bytes read so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// The accumulated fault flags. A set flag never clears.
    pub fn faults(&self) -> CursorFault {
        self.faults
    }

    /// Moves the cursor to an absolute offset.
    ///
    /// Used to "unread" a tag byte when a scan finds something the next stage
    /// must re-read. Seeking past the end of the buffer is a capacity fault.
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

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        let bytes = self.read_raw(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        let bytes = self.read_raw(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        let bytes = self.read_raw(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        let bytes = self.read_raw(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        let bytes = self.read_raw(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(out))
    }

    pub fn read_i64(&mut self) -> Result<i64, CursorError> {
        let bytes = self.read_raw(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(out))
    }

    /// Reads a contiguous run of raw bytes as a borrowed view.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        self.read_raw(len)
    }

    /// Reads a fixed-layout value by copying its byte representation.
    pub fn read_pod<T: Pod>(&mut self) -> Result<T, CursorError> {
        let bytes = self.read_raw(core::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads `len` fixed-layout values as a borrowed, unaligned-safe view.
    pub fn read_pod_slice<T: Pod>(&mut self, len: usize) -> Result<PodSlice<'a, T>, CursorError> {
        let bytes = self.read_raw(core::mem::size_of::<T>() * len)?;
        Ok(PodSlice::new(bytes, len))
    }

    fn read_raw(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        let remaining = self.buffer.len() - self.position;
        if len > remaining {
            self.faults |= CursorFault::CAPACITY_EXCEEDED;
            return Err(CursorError::CapacityExceeded {
                needed: len,
                remaining,
                capacity: self.buffer.len(),
            });
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WriteCursor;

    #[test]
    fn round_trips_primitives() {
        let mut buffer = [0u8; 32];
        let mut writer = WriteCursor::new(&mut buffer);
        writer.write_u8(7).unwrap();
        writer.write_u16(0xBEEF).unwrap();
        writer.write_i32(-12345).unwrap();
        writer.write_i64(i64::MIN + 1).unwrap();

        let mut reader = ReadCursor::new(&buffer);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32().unwrap(), -12345);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN + 1);
    }

    #[test]
    fn failed_read_does_not_advance() {
        let buffer = [1u8, 2];
        let mut reader = ReadCursor::new(&buffer);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 0);
        assert!(reader.faults().contains(CursorFault::CAPACITY_EXCEEDED));
        // the two bytes that do exist are still readable
        assert_eq!(reader.read_u16().unwrap(), u16::from_le_bytes([1, 2]));
    }

    #[test]
    fn unread_one_byte_via_seek() {
        let buffer = [0x02u8, 0x04, 0xAA];
        let mut reader = ReadCursor::new(&buffer);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        let tag = reader.read_u8().unwrap();
        assert_eq!(tag, 0x04);
        reader.seek(reader.position() - 1).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0x04);
    }

    #[test]
    fn borrowed_bytes_outlive_cursor_motion() {
        let buffer = [10u8, 11, 12, 13];
        let mut reader = ReadCursor::new(&buffer);
        let view = reader.read_bytes(2).unwrap();
        reader.read_u16().unwrap();
        assert_eq!(view, &[10, 11]);
    }
}
