use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use tether_shared::constants::OPEN_KEY_SIZE;
use tether_shared::{BufferPool, DataRegistry};

use crate::connection::{Admission, ConnectionManager};
use crate::scheduler::{Marshal, MutationGate, Ticker};
use crate::server::server_config::ServerConfig;
use crate::time::SimTime;
use crate::transport::{FramedListener, IncomingConnection, ListenError, Transport};
use crate::view::ViewStagger;
use crate::world::{World, WorldError, WorldManager};

/// Stops a running server from another thread.
#[derive(Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// The simulation host: worlds, connections, and the tick loop driving them.
///
/// All structural state is owned by the simulation thread. Each tick runs,
/// in order: clock advance, marshaled callbacks, connection admission and
/// eviction, the parallel receive phase, world systems, the staggered
/// parallel view phase, and the parallel send phase. The parallel phases
/// hold the mutation gate closed.
pub struct Server {
    config: ServerConfig,
    registry: Arc<DataRegistry>,
    pool: Arc<BufferPool>,
    time: Arc<SimTime>,
    gate: Arc<MutationGate>,
    marshal: Arc<Marshal>,
    worlds: WorldManager,
    connections: ConnectionManager,
    stagger: ViewStagger,
    ticker: Ticker,
    listener: Option<FramedListener>,
    running: Arc<AtomicBool>,
    incoming_scratch: Vec<IncomingConnection>,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        registry: Arc<DataRegistry>,
        admission: Box<dyn Admission>,
    ) -> Self {
        let pool = BufferPool::new();
        let gate = MutationGate::new();
        let connections = ConnectionManager::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            config.connection.clone(),
            Arc::clone(&gate),
            admission,
            config.network.max_create_queue,
        );
        let ticker = Ticker::new(
            Duration::from_millis(config.timing.update_interval_ms),
            config.timing.strategy,
            config.timing.max_delta_batches,
        );
        let stagger = ViewStagger::new(config.timing.updates_per_view_update);
        Self {
            config,
            registry,
            pool,
            time: Arc::new(SimTime::new()),
            gate,
            marshal: Arc::new(Marshal::new()),
            worlds: WorldManager::new(),
            connections,
            stagger,
            ticker,
            listener: None,
            running: Arc::new(AtomicBool::new(false)),
            incoming_scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DataRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn time(&self) -> &Arc<SimTime> {
        &self.time
    }

    pub fn gate(&self) -> &Arc<MutationGate> {
        &self.gate
    }

    pub fn marshal(&self) -> &Arc<Marshal> {
        &self.marshal
    }

    pub fn worlds(&self) -> &WorldManager {
        &self.worlds
    }

    pub fn worlds_mut(&mut self) -> &mut WorldManager {
        &mut self.worlds
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Builds a world bound to this server's registry and clock.
    pub fn create_world(&self, world_id: i32, store: Box<dyn crate::world::EntityStore>) -> World {
        World::new(
            world_id,
            Arc::clone(&self.registry),
            store,
            Arc::clone(&self.time),
        )
    }

    /// Registers a world; a structural change, gated like any other.
    pub fn add_world(&mut self, world: World) -> Result<(), WorldError> {
        self.gate.require_open()?;
        self.worlds.add(world)
    }

    /// Removes a world, stopping its systems. Connections attached to it are
    /// disposed on their next send.
    pub fn remove_world(&mut self, world_id: i32) -> Result<bool, WorldError> {
        self.gate.require_open()?;
        Ok(self.worlds.remove(world_id))
    }

    /// Starts the TCP listener. Admitted sockets join the pending queue and
    /// enter the simulation on the next tick.
    pub fn listen(&mut self) -> Result<SocketAddr, ListenError> {
        let listener =
            FramedListener::listen(&self.config.network, &self.config.connection, &self.pool)?;
        let local_addr = listener.local_addr();
        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Queues an in-process transport for admission, bypassing the listener.
    pub fn queue_connection(
        &self,
        open_key: [u8; OPEN_KEY_SIZE],
        transport: Box<dyn Transport>,
    ) -> bool {
        self.connections.queue(open_key, None, transport)
    }

    /// Runs the tick loop on the calling thread until [`ServerHandle::stop`].
    pub fn run(&mut self) {
        self.running.store(true, Ordering::Release);
        log::info!("server loop starting");
        let mut delta_batches = 1;
        while self.running.load(Ordering::Acquire) {
            self.tick(delta_batches);
            delta_batches = self.ticker.wait_next();
        }
        log::info!("server loop stopped");
        self.shutdown();
    }

    /// Runs one simulation tick advancing `delta_batches` intervals. Exposed
    /// for tests and external drivers; [`run`](Self::run) calls it in a loop.
    pub fn tick(&mut self, delta_batches: u32) {
        self.marshal.bind();
        let interval_ms = self.config.timing.update_interval_ms as i64;
        self.time.advance(interval_ms * i64::from(delta_batches.max(1)));
        let time = self.time.total_ms();
        let tick = self.time.tick();

        self.marshal.drain();

        if let Some(listener) = &self.listener {
            listener.poll_created(&mut self.incoming_scratch);
        }
        for incoming in self.incoming_scratch.drain(..) {
            self.connections.queue(
                incoming.open_key,
                Some(incoming.addr),
                Box::new(incoming.transport),
            );
        }
        if let Err(error) = self.connections.admit_pending(&self.worlds) {
            log::error!("admission skipped this tick: {error}");
        }
        self.connections.evict_disconnected();

        // receive phase
        {
            let _scope = self.gate.close();
            self.connections
                .as_mut_slice()
                .par_iter_mut()
                .for_each(|connection| {
                    if let Err(error) = connection.receive(time) {
                        log::warn!(
                            "connection {} receive failed: {error}; disposing",
                            connection.id()
                        );
                        connection.dispose();
                    }
                });
        }

        self.worlds.update_all();

        // view phase, staggered across ticks
        {
            let _scope = self.gate.close();
            let worlds = &self.worlds;
            let stagger = &self.stagger;
            self.connections
                .as_mut_slice()
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, connection)| {
                    if !stagger.should_recompute(index) {
                        return;
                    }
                    if let Some(world) = worlds.get(connection.world_id()) {
                        connection.update_view(world);
                    }
                });
        }
        self.stagger.advance();

        // send phase
        {
            let _scope = self.gate.close();
            let worlds = &self.worlds;
            self.connections
                .as_mut_slice()
                .par_iter_mut()
                .for_each(|connection| {
                    let Some(world) = worlds.get(connection.world_id()) else {
                        log::warn!(
                            "connection {} lost world {}; disposing",
                            connection.id(),
                            connection.world_id()
                        );
                        connection.dispose();
                        return;
                    };
                    if let Err(error) = connection.send(world, time, tick) {
                        log::warn!(
                            "connection {} send failed: {error}; disposing",
                            connection.id()
                        );
                        connection.dispose();
                    }
                });
        }
    }

    fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
        self.connections.dispose_all();
        self.worlds.remove_all();
    }
}
