use core::marker::PhantomData;

use bytemuck::Pod;

/// A borrowed view over a contiguous run of fixed-layout values.
///
/// The underlying bytes may be unaligned for `T` (they come straight out of a
/// receive buffer), so elements are decoded with unaligned-safe loads instead
/// of being reinterpreted in place. The view never copies the payload; it is
/// only valid for the lifetime of the buffer it was read from.
#[derive(Clone, Copy)]
pub struct PodSlice<'a, T: Pod> {
    bytes: &'a [u8],
    len: usize,
    marker: PhantomData<T>,
}

impl<'a, T: Pod> PodSlice<'a, T> {
    /// Wraps `len` elements worth of bytes. `bytes` must hold exactly
    /// `len * size_of::<T>()` bytes.
    pub(crate) fn new(bytes: &'a [u8], len: usize) -> Self {
        debug_assert_eq!(bytes.len(), len * core::mem::size_of::<T>());
        Self {
            bytes,
            len,
            marker: PhantomData,
        }
    }

    /// Builds a view over an external byte run, returning `None` when the
    /// byte count does not match `len` elements.
    pub fn from_bytes(bytes: &'a [u8], len: usize) -> Option<Self> {
        if bytes.len() != len * core::mem::size_of::<T>() {
            return None;
        }
        Some(Self::new(bytes, len))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw bytes backing this view.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decodes the element at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let size = core::mem::size_of::<T>();
        Some(bytemuck::pod_read_unaligned(
            &self.bytes[index * size..(index + 1) * size],
        ))
    }

    pub fn iter(&self) -> PodSliceIter<'a, T> {
        PodSliceIter {
            slice: *self,
            index: 0,
        }
    }

    /// Copies every element out into an owned vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

pub struct PodSliceIter<'a, T: Pod> {
    slice: PodSlice<'a, T>,
    index: usize,
}

impl<'a, T: Pod> Iterator for PodSliceIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let value = self.slice.get(self.index)?;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slice.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: Pod> IntoIterator for PodSlice<'a, T> {
    type Item = T;
    type IntoIter = PodSliceIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unaligned_elements() {
        // one leading byte pushes the i32 run off alignment
        let mut bytes = vec![0xFFu8];
        for value in [1i32, -2, 3] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let slice = PodSlice::<i32>::from_bytes(&bytes[1..], 3).unwrap();
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.get(0), Some(1));
        assert_eq!(slice.get(1), Some(-2));
        assert_eq!(slice.get(2), Some(3));
        assert_eq!(slice.get(3), None);
        assert_eq!(slice.to_vec(), vec![1, -2, 3]);
    }

    #[test]
    fn rejects_mismatched_byte_count() {
        let bytes = [0u8; 7];
        assert!(PodSlice::<i32>::from_bytes(&bytes, 2).is_none());
    }
}
