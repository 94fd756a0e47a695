#[allow(clippy::module_inception)]
mod server;
mod server_config;

pub use server::{Server, ServerHandle};
pub use server_config::{NetworkConfig, ServerConfig, TimingConfig};
