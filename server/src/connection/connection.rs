use tether_shared::{
    BatchHandler, BatchProtocolEngine, CursorFault, PooledBuffer, ReceiveError, SendError,
};

use crate::transport::{Transport, TransportErrorCode, TransportState};
use crate::view::{recompute, ViewQuery, ViewSet};
use crate::world::World;

/// One admitted remote peer: its transport, protocol engine, and view.
///
/// Owned by the connection manager; during the parallel phases each
/// connection is handed to exactly one worker, so `&mut self` methods need
/// no further synchronization.
pub struct Connection {
    id: String,
    route: String,
    world_id: i32,
    transport: Box<dyn Transport>,
    engine: BatchProtocolEngine,
    view: ViewSet,
    queries: Vec<Box<dyn ViewQuery>>,
    receive_scratch: Vec<PooledBuffer>,
    disposed: bool,
}

impl Connection {
    pub fn new(
        id: String,
        route: String,
        world_id: i32,
        transport: Box<dyn Transport>,
        engine: BatchProtocolEngine,
    ) -> Self {
        Self {
            id,
            route,
            world_id,
            transport,
            engine,
            view: ViewSet::new(),
            queries: Vec::new(),
            receive_scratch: Vec::new(),
            disposed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn world_id(&self) -> i32 {
        self.world_id
    }

    /// Round-trip latency in milliseconds; `None` until the first pong.
    pub fn latency(&self) -> Option<i64> {
        self.engine.latency()
    }

    pub fn view(&self) -> &ViewSet {
        &self.view
    }

    pub fn transport_errors(&self) -> TransportErrorCode {
        self.transport.errors()
    }

    pub fn send_faults(&self) -> CursorFault {
        self.engine.send_faults()
    }

    pub fn add_receive_handler(&mut self, handler: Box<dyn BatchHandler>) {
        self.engine.add_receive_handler(handler);
    }

    pub fn add_remote_received_handler(&mut self, handler: Box<dyn BatchHandler>) {
        self.engine.add_remote_received_handler(handler);
    }

    pub fn add_view_query(&mut self, query: Box<dyn ViewQuery>) {
        self.queries.push(query);
    }

    /// A connection survives eviction while its transport is connected and
    /// fault-free and it has not been disposed.
    pub fn is_connected(&self) -> bool {
        !self.disposed
            && self.transport.state() == TransportState::Connected
            && self.transport.errors().is_clear()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Recomputes the view against the connection's world.
    pub fn update_view(&mut self, world: &World) {
        let Self { view, queries, .. } = self;
        recompute(view, queries, world);
    }

    /// Drains the transport and decodes every queued inbound batch.
    ///
    /// An error abandons the remaining queued buffers; they return to the
    /// pool and the connection is expected to be disposed.
    pub fn receive(&mut self, time: i64) -> Result<(), ReceiveError> {
        self.transport.receive(&mut self.receive_scratch);
        for buffer in self.receive_scratch.drain(..) {
            self.engine.try_receive(&buffer, time)?;
        }
        Ok(())
    }

    /// Assembles this tick's batch from the view diff and the world's delta
    /// buffers and hands it to the transport.
    ///
    /// Entities without a delta entry contribute nothing and are skipped;
    /// a send error leaves the view diff intact for the disposal path.
    pub fn send(&mut self, world: &World, time: i64, tick: u64) -> Result<(), SendError> {
        let removed: Vec<i32> = self
            .view
            .removed_entities()
            .iter()
            .map(|entity| entity.id)
            .collect();
        let view = &self.view;
        let updated = view.current().filter_map(|entity| {
            world
                .delta_of(entity)
                .map(|delta| (entity.id, view.is_new(entity), delta))
        });

        let buffer = self
            .engine
            .try_send(world.id(), time, tick, &removed, updated)?;
        if !self.transport.send(buffer) {
            log::debug!(
                "connection {} dropped an outbound batch; transport closed",
                self.id
            );
        }
        self.view.post_send();
        Ok(())
    }

    /// Closes the transport and releases engine-retained buffers.
    /// Idempotent; the manager fires the admission `closed` callback when it
    /// evicts the connection.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.transport.close();
        self.engine.dispose();
        self.receive_scratch.clear();
    }
}
