//! # Tether Cursor
//! Bounds-checked, endian-normalizing byte cursors. Every tether wire format is
//! written and parsed through these primitives.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod pod_slice;
mod reader;
mod writer;

pub use error::{CursorError, CursorFault};
pub use pod_slice::{PodSlice, PodSliceIter};
pub use reader::ReadCursor;
pub use writer::WriteCursor;

pub use bytemuck::{Pod, Zeroable};
