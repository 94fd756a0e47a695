mod buffer;
mod data_type;
mod delta;
mod error;
mod registry;

pub use buffer::DataBuffer;
pub use data_type::DataTypeInfo;
pub use delta::{EntityDelta, EntityDeltaStore};
pub use error::{DataError, RegistryError};
pub use registry::{DataRegistry, DataRegistryBuilder};
