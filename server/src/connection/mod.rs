mod admission;
#[allow(clippy::module_inception)]
mod connection;
mod connection_manager;

pub use admission::{Admission, AdmissionTicket};
pub use connection::Connection;
pub use connection_manager::{ConnectionManager, PendingConnection};
