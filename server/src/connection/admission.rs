use std::net::SocketAddr;

use tether_shared::constants::OPEN_KEY_SIZE;

use crate::connection::Connection;

/// The outcome of a successful [`Admission::open`].
pub struct AdmissionTicket {
    /// Unique string id for the connection; duplicates are rejected.
    pub connection_id: String,
    /// Opaque routing label carried on the connection for the application.
    pub route: String,
    /// The world the connection attaches to; it must already exist.
    pub world_id: i32,
}

/// The application-side gatekeeper for new connections.
///
/// A connecting socket's first bytes are its open key; `open` resolves the
/// key to a ticket or rejects the connection. Runs on the simulation thread
/// during the admit phase.
pub trait Admission: Send {
    /// Resolves an open key to an admission ticket. `None` rejects the
    /// connection and closes its transport. `addr` is absent for in-process
    /// transports.
    fn open(
        &mut self,
        open_key: &[u8; OPEN_KEY_SIZE],
        addr: Option<SocketAddr>,
    ) -> Option<AdmissionTicket>;

    /// Called once for each admitted connection, before its first tick.
    /// Register batch handlers and view queries here.
    fn admitted(&mut self, connection: &mut Connection) {
        let _ = connection;
    }

    /// Called when an admitted connection is disposed.
    fn closed(&mut self, connection_id: &str) {
        let _ = connection_id;
    }
}
