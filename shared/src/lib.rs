//! # Tether Shared
//! Protocol and data-model code common to every tether endpoint: the
//! registered POD data model, per-entity delta buffers, and the batch
//! protocol engine with its reliability layer.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod buffer_pool;
pub mod connection_config;
pub mod constants;
pub mod data;
pub mod protocol;
pub mod types;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use connection_config::ConnectionConfig;
pub use data::{
    DataBuffer, DataError, DataRegistry, DataRegistryBuilder, DataTypeInfo, EntityDelta,
    EntityDeltaStore, RegistryError,
};
pub use protocol::{
    BatchControl, BatchDecoder, BatchHandler, BatchHeader, BatchProtocolEngine, DataRecord,
    DecodeError, MessageType, ReceiveError, SendError,
};
pub use types::EntityRef;

pub use tether_cursor::{CursorError, CursorFault, Pod, PodSlice, ReadCursor, WriteCursor, Zeroable};
