//! # Tether Server
//! The authoritative simulation host: a single-writer tick loop over worlds
//! and admitted connections, with rayon-parallel receive/view/send phases
//! and a tokio-backed framed TCP transport.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod connection;
pub mod scheduler;
pub mod server;
pub mod time;
pub mod timed_bucket;
pub mod transport;
pub mod view;
pub mod world;

pub use connection::{Admission, AdmissionTicket, Connection, ConnectionManager, PendingConnection};
pub use scheduler::{ClosedScope, GateError, Marshal, MutationGate, TickStrategy, Ticker};
pub use server::{NetworkConfig, Server, ServerConfig, ServerHandle, TimingConfig};
pub use time::SimTime;
pub use timed_bucket::TimedBucket;
pub use transport::{
    ChannelTransport, FramedListener, IncomingConnection, ListenError, TcpTransport, Transport,
    TransportErrorCode, TransportState,
};
pub use view::{recompute, ViewQuery, ViewSink, ViewSet, ViewStagger};
pub use world::{
    DestroyedCallback, EntityStore, LocalEntityStore, World, WorldError, WorldManager, WorldSystem,
};

pub use tether_shared as shared;
