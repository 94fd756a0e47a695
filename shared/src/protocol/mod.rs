mod batch_header;
mod decoder;
mod engine;
mod error;
mod handler;
mod message_type;

pub use batch_header::BatchHeader;
pub use decoder::BatchDecoder;
pub use engine::BatchProtocolEngine;
pub use error::{DecodeError, ReceiveError, SendError};
pub use handler::{BatchControl, BatchHandler, DataRecord};
pub use message_type::MessageType;
