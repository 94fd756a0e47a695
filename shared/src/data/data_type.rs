use std::any::TypeId;

use crate::constants::MAX_RECORDS;

/// Metadata for one registered data type.
///
/// Ids are assigned in registration order; the byte id is the only thing that
/// crosses the wire. `size` is the encoded payload size (0 for marker types
/// that carry no payload). `max_span_len` caps span writes so an encoded span
/// payload never exceeds the wire's `u16` length field.
#[derive(Debug, Clone)]
pub struct DataTypeInfo {
    pub(crate) id: u8,
    pub(crate) size: usize,
    pub(crate) max_span_len: usize,
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
}

impl DataTypeInfo {
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Encoded payload size in bytes; 0 for zero-size marker types.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The maximum element count of a span record of this type.
    pub fn max_span_len(&self) -> usize {
        self.max_span_len
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Encoded size of a scalar record: `[id][payload]`.
    pub fn scalar_record_size(&self) -> usize {
        1 + self.size
    }

    /// Encoded size of a span record: `[0xFF][id][len][payload]`.
    pub fn span_record_size(&self, len: usize) -> usize {
        4 + self.size * len
    }

    pub(crate) fn compute_max_span_len(size: usize, requested: Option<usize>) -> usize {
        if size == 0 {
            return requested.unwrap_or(MAX_RECORDS).min(MAX_RECORDS);
        }
        let cap = MAX_RECORDS / size;
        requested.unwrap_or(cap).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_cap_keeps_encoded_payload_under_u16() {
        assert_eq!(DataTypeInfo::compute_max_span_len(4, None), 65535 / 4);
        assert_eq!(DataTypeInfo::compute_max_span_len(4, Some(8)), 8);
        assert_eq!(DataTypeInfo::compute_max_span_len(4, Some(1_000_000)), 65535 / 4);
        assert_eq!(DataTypeInfo::compute_max_span_len(0, None), 65535);
    }
}
