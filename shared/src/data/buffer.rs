use tether_cursor::{CursorError, Pod, PodSlice, WriteCursor};

use crate::constants::{MAX_RECORDS, SPAN_FLAG};
use crate::data::data_type::DataTypeInfo;
use crate::data::error::DataError;
use crate::data::registry::DataRegistry;

const MIN_CAPACITY: usize = 32;

/// One delta buffer of encoded data records.
///
/// Records are laid out back to back: a scalar record is
/// `[typeId][payload]`, a span record is `[0xFF][typeId][len:u16][payload]`.
/// Records are located by linear scan keyed on `(typeId, isSpan)` — entities
/// carry few distinct data types, so a secondary index would cost more than
/// it saves.
#[derive(Default)]
pub struct DataBuffer {
    data: Vec<u8>,
    records_written: usize,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total encoded bytes currently held.
    pub fn bytes_written(&self) -> usize {
        self.data.len()
    }

    /// Number of records currently held.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// The raw encoded record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Drops all records but keeps the backing capacity for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
        self.records_written = 0;
    }

    /// Appends a scalar record unconditionally.
    pub fn write_event<T: Pod>(
        &mut self,
        info: &DataTypeInfo,
        value: &T,
    ) -> Result<(), DataError> {
        self.check_record_count()?;
        self.reserve_min();
        self.data.push(info.id);
        self.data.extend_from_slice(bytemuck::bytes_of(value));
        self.records_written += 1;
        Ok(())
    }

    /// Appends a span record unconditionally.
    pub fn write_event_span<T: Pod>(
        &mut self,
        info: &DataTypeInfo,
        values: &[T],
    ) -> Result<(), DataError> {
        self.check_record_count()?;
        self.check_span_len(info, values.len())?;
        self.reserve_min();
        self.data.push(SPAN_FLAG);
        self.data.push(info.id);
        self.data
            .extend_from_slice(&(values.len() as u16).to_le_bytes());
        self.data.extend_from_slice(bytemuck::cast_slice(values));
        self.records_written += 1;
        Ok(())
    }

    /// Writes a scalar record, overwriting in place when one already exists
    /// for this type. Scalar payload size never changes, so an overwrite
    /// never moves other records.
    pub fn write_persistent<T: Pod>(
        &mut self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        value: &T,
    ) -> Result<(), DataError> {
        match self.position_of(registry, info.id, false) {
            Some((offset, _)) => {
                let payload = &mut self.data[offset + 1..offset + 1 + info.size];
                payload.copy_from_slice(bytemuck::bytes_of(value));
                Ok(())
            }
            None => self.write_event(info, value),
        }
    }

    /// Writes a span record, resizing in place when one already exists with
    /// a different element count: trailing records shift by the size delta
    /// before the new payload lands.
    pub fn write_persistent_span<T: Pod>(
        &mut self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        values: &[T],
    ) -> Result<(), DataError> {
        self.check_span_len(info, values.len())?;
        let Some((offset, current_size)) = self.position_of(registry, info.id, true) else {
            return self.write_event_span(info, values);
        };

        let span_size = info.span_record_size(values.len());
        if span_size != current_size {
            let end = offset + current_size;
            let old_len = self.data.len();
            if span_size > current_size {
                let grow = span_size - current_size;
                self.data.resize(old_len + grow, 0);
                self.data.copy_within(end..old_len, end + grow);
            } else {
                let shrink = current_size - span_size;
                self.data.copy_within(end..old_len, end - shrink);
                self.data.truncate(old_len - shrink);
            }
        }

        self.data[offset] = SPAN_FLAG;
        self.data[offset + 1] = info.id;
        self.data[offset + 2..offset + 4].copy_from_slice(&(values.len() as u16).to_le_bytes());
        self.data[offset + 4..offset + span_size].copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Decodes the scalar record for `info`, if present.
    pub fn try_read<T: Pod>(&self, registry: &DataRegistry, info: &DataTypeInfo) -> Option<T> {
        let (offset, _) = self.position_of(registry, info.id, false)?;
        Some(bytemuck::pod_read_unaligned(
            &self.data[offset + 1..offset + 1 + info.size],
        ))
    }

    /// Returns a borrowed view of the span record for `info`, if present.
    pub fn try_read_span<T: Pod>(
        &self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
    ) -> Option<PodSlice<'_, T>> {
        let (offset, size) = self.position_of(registry, info.id, true)?;
        let len = u16::from_le_bytes([self.data[offset + 2], self.data[offset + 3]]) as usize;
        PodSlice::from_bytes(&self.data[offset + 4..offset + size], len)
    }

    /// Appends the raw record bytes to an outbound batch.
    pub fn write_to(&self, cursor: &mut WriteCursor<'_>) -> Result<(), CursorError> {
        if self.data.is_empty() {
            return Ok(());
        }
        cursor.write_bytes(&self.data)
    }

    fn check_record_count(&self) -> Result<(), DataError> {
        if self.records_written >= MAX_RECORDS {
            return Err(DataError::TooManyRecords {
                count: self.records_written + 1,
                limit: MAX_RECORDS,
            });
        }
        Ok(())
    }

    fn check_span_len(&self, info: &DataTypeInfo, len: usize) -> Result<(), DataError> {
        if len > info.max_span_len {
            return Err(DataError::SpanTooLong {
                type_name: info.type_name,
                len,
                max: info.max_span_len,
            });
        }
        Ok(())
    }

    fn reserve_min(&mut self) {
        if self.data.capacity() == 0 {
            self.data.reserve(MIN_CAPACITY);
        }
    }

    /// Scans for the record matching `(type_id, span)`, returning its offset
    /// and encoded size.
    fn position_of(
        &self,
        registry: &DataRegistry,
        type_id: u8,
        span: bool,
    ) -> Option<(usize, usize)> {
        let mut offset = 0;
        for _ in 0..self.records_written {
            let mut record_type = self.data[offset];
            let is_span = record_type == SPAN_FLAG;
            let size = if is_span {
                record_type = self.data[offset + 1];
                let len =
                    u16::from_le_bytes([self.data[offset + 2], self.data[offset + 3]]) as usize;
                4 + registry.size_of_id(record_type)? * len
            } else {
                1 + registry.size_of_id(record_type)?
            };

            if record_type == type_id && span == is_span {
                return Some((offset, size));
            }
            offset += size;
        }
        None
    }
}
