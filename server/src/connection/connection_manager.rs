use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tether_shared::constants::OPEN_KEY_SIZE;
use tether_shared::{BatchProtocolEngine, BufferPool, ConnectionConfig, DataRegistry};

use crate::connection::admission::Admission;
use crate::connection::connection::Connection;
use crate::scheduler::{GateError, MutationGate};
use crate::transport::Transport;
use crate::world::WorldManager;

/// A transport waiting for admission.
pub struct PendingConnection {
    pub open_key: [u8; OPEN_KEY_SIZE],
    pub addr: Option<SocketAddr>,
    pub transport: Box<dyn Transport>,
}

/// The live connection list plus the pending queue feeding it.
///
/// Admission and eviction run on the simulation thread; `queue` may be
/// called from anywhere, which is why the pending list carries its own lock.
pub struct ConnectionManager {
    registry: Arc<DataRegistry>,
    pool: Arc<BufferPool>,
    config: ConnectionConfig,
    gate: Arc<MutationGate>,
    admission: Box<dyn Admission>,
    pending: Mutex<VecDeque<PendingConnection>>,
    max_pending: usize,
    connections: Vec<Connection>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<DataRegistry>,
        pool: Arc<BufferPool>,
        config: ConnectionConfig,
        gate: Arc<MutationGate>,
        admission: Box<dyn Admission>,
        max_pending: usize,
    ) -> Self {
        Self {
            registry,
            pool,
            config,
            gate,
            admission,
            pending: Mutex::new(VecDeque::new()),
            max_pending: max_pending.max(1),
            connections: Vec::new(),
        }
    }

    /// Queues a transport for admission on the next tick. Returns `false`
    /// and closes the transport when the pending queue is full.
    pub fn queue(
        &self,
        open_key: [u8; OPEN_KEY_SIZE],
        addr: Option<SocketAddr>,
        transport: Box<dyn Transport>,
    ) -> bool {
        let mut pending = self.pending.lock().expect("pending queue lock poisoned");
        if pending.len() >= self.max_pending {
            drop(pending);
            log::warn!("pending connection queue full; rejecting a connection");
            transport.close();
            return false;
        }
        pending.push_back(PendingConnection {
            open_key,
            addr,
            transport,
        });
        true
    }

    /// Admits every pending transport: the admission layer resolves the open
    /// key, the target world must exist, and the connection id must be
    /// unused. Rejected transports are closed.
    pub fn admit_pending(&mut self, worlds: &WorldManager) -> Result<(), GateError> {
        self.gate.require_open()?;
        let drained: Vec<PendingConnection> = {
            let mut pending = self.pending.lock().expect("pending queue lock poisoned");
            pending.drain(..).collect()
        };

        for incoming in drained {
            let Some(ticket) = self.admission.open(&incoming.open_key, incoming.addr) else {
                log::debug!("connection rejected by the admission layer");
                incoming.transport.close();
                continue;
            };
            if !worlds.contains(ticket.world_id) {
                log::warn!(
                    "connection {} targets unknown world {}; rejected",
                    ticket.connection_id,
                    ticket.world_id
                );
                incoming.transport.close();
                self.admission.closed(&ticket.connection_id);
                continue;
            }
            if self.contains(&ticket.connection_id) {
                log::warn!(
                    "connection id {} is already in use; rejected",
                    ticket.connection_id
                );
                incoming.transport.close();
                self.admission.closed(&ticket.connection_id);
                continue;
            }

            let engine = BatchProtocolEngine::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.pool),
                &self.config,
            );
            let mut connection = Connection::new(
                ticket.connection_id,
                ticket.route,
                ticket.world_id,
                incoming.transport,
                engine,
            );
            self.admission.admitted(&mut connection);
            log::info!(
                "connection {} admitted to world {}",
                connection.id(),
                connection.world_id()
            );
            self.connections.push(connection);
        }
        Ok(())
    }

    /// Drops every connection that disconnected or was disposed during the
    /// tick, firing the admission `closed` callback for each.
    pub fn evict_disconnected(&mut self) {
        let mut index = 0;
        while index < self.connections.len() {
            if self.connections[index].is_connected() {
                index += 1;
                continue;
            }
            let mut connection = self.connections.remove(index);
            connection.dispose();
            log::info!(
                "connection {} evicted (transport errors: {})",
                connection.id(),
                connection.transport_errors()
            );
            self.admission.closed(connection.id());
        }
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.iter().any(|c| c.id() == connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id() == connection_id)
    }

    pub fn get_mut(&mut self, connection_id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id() == connection_id)
    }

    /// Mutable access for the parallel phases; each worker takes one
    /// connection.
    pub fn as_mut_slice(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Disposes everything; called on server shutdown.
    pub fn dispose_all(&mut self) {
        for pending in self
            .pending
            .lock()
            .expect("pending queue lock poisoned")
            .drain(..)
        {
            pending.transport.close();
        }
        for mut connection in self.connections.drain(..) {
            connection.dispose();
            self.admission.closed(connection.id());
        }
    }
}
