use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};

use tether_server::{
    Admission, AdmissionTicket, ChannelTransport, Connection, LocalEntityStore, Server,
    ServerConfig, Transport, TransportState, ViewQuery, ViewSink, World,
};
use tether_shared::constants::OPEN_KEY_SIZE;
use tether_shared::{
    BatchControl, BatchDecoder, BatchHandler, DataRecord, DataRegistry, EntityRef,
};

#[derive(Clone, Copy, PartialEq, Debug, Pod, Zeroable)]
#[repr(C)]
struct Health(u32);

fn registry() -> Arc<DataRegistry> {
    let mut builder = DataRegistry::builder();
    builder.register::<Health>().unwrap();
    Arc::new(builder.build())
}

/// Pushes a shared entity list into the view each recompute.
struct ListQuery {
    entities: Arc<Mutex<Vec<EntityRef>>>,
}

impl ViewQuery for ListQuery {
    fn collect(&mut self, _world: &World, out: &mut ViewSink<'_>) {
        for entity in self.entities.lock().unwrap().iter() {
            out.push(*entity);
        }
    }
}

/// Records decoded batch ids on the server side of a connection.
struct BatchIdLog {
    ids: Arc<Mutex<Vec<u16>>>,
}

impl BatchHandler for BatchIdLog {
    fn begin_batch(
        &mut self,
        _world_id: i32,
        batch_id: u16,
        _local_time: i64,
        _remote_time: i64,
    ) -> BatchControl {
        self.ids.lock().unwrap().push(batch_id);
        BatchControl::Read
    }
}

#[derive(Default)]
struct AdmissionLog {
    admitted: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
}

/// Key layout: byte 0 is the client number (0 rejects), byte 1 the world id.
struct TestAdmission {
    log: Arc<AdmissionLog>,
    visible: Arc<Mutex<Vec<EntityRef>>>,
    received_ids: Arc<Mutex<Vec<u16>>>,
}

impl Admission for TestAdmission {
    fn open(
        &mut self,
        open_key: &[u8; OPEN_KEY_SIZE],
        _addr: Option<std::net::SocketAddr>,
    ) -> Option<AdmissionTicket> {
        if open_key[0] == 0 {
            return None;
        }
        Some(AdmissionTicket {
            connection_id: format!("client-{}", open_key[0]),
            route: "play".into(),
            world_id: i32::from(open_key[1]),
        })
    }

    fn admitted(&mut self, connection: &mut Connection) {
        connection.add_view_query(Box::new(ListQuery {
            entities: Arc::clone(&self.visible),
        }));
        connection.add_receive_handler(Box::new(BatchIdLog {
            ids: Arc::clone(&self.received_ids),
        }));
        self.log
            .admitted
            .lock()
            .unwrap()
            .push(connection.id().to_string());
    }

    fn closed(&mut self, connection_id: &str) {
        self.log.closed.lock().unwrap().push(connection_id.to_string());
    }
}

struct Harness {
    server: Server,
    store: Arc<LocalEntityStore>,
    log: Arc<AdmissionLog>,
    visible: Arc<Mutex<Vec<EntityRef>>>,
    received_ids: Arc<Mutex<Vec<u16>>>,
}

fn harness() -> Harness {
    let log = Arc::new(AdmissionLog::default());
    let visible = Arc::new(Mutex::new(Vec::new()));
    let received_ids = Arc::new(Mutex::new(Vec::new()));

    let mut config = ServerConfig::default();
    // recompute every view every tick for determinism
    config.timing.updates_per_view_update = 1;

    let mut server = Server::new(
        config,
        registry(),
        Box::new(TestAdmission {
            log: Arc::clone(&log),
            visible: Arc::clone(&visible),
            received_ids: Arc::clone(&received_ids),
        }),
    );
    let store = Arc::new(LocalEntityStore::new(Arc::clone(server.gate())));
    let world = server.create_world(7, Box::new(Arc::clone(&store)));
    server.add_world(world).unwrap();

    Harness {
        server,
        store,
        log,
        visible,
        received_ids,
    }
}

fn key(client: u8, world: u8) -> [u8; OPEN_KEY_SIZE] {
    let mut key = [0u8; OPEN_KEY_SIZE];
    key[0] = client;
    key[1] = world;
    key
}

/// Collects `(entity_id, Health)` pairs decoded from server batches.
struct HealthSink {
    registry: Arc<DataRegistry>,
    seen: Arc<Mutex<Vec<(i32, Health)>>>,
}

impl BatchHandler for HealthSink {
    fn begin_batch(
        &mut self,
        _world_id: i32,
        _batch_id: u16,
        _local_time: i64,
        _remote_time: i64,
    ) -> BatchControl {
        BatchControl::Read
    }

    fn data(&mut self, entity_id: i32, record: &DataRecord<'_>) -> bool {
        if let Some(health) = record.decode::<Health>(&self.registry) {
            self.seen.lock().unwrap().push((entity_id, health));
        }
        true
    }
}

#[test]
fn admitted_connection_streams_its_view() {
    let mut h = harness();
    let (server_end, client_end) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(1, 7), Box::new(server_end)));

    h.server.tick(1);
    assert_eq!(h.server.connections().len(), 1);
    assert_eq!(*h.log.admitted.lock().unwrap(), vec!["client-1"]);

    let entity = h.store.create().unwrap();
    h.server
        .worlds()
        .get(7)
        .unwrap()
        .push_persistent(entity, &Health(100))
        .unwrap();
    h.visible.lock().unwrap().push(entity);

    h.server.tick(1);

    let mut frames = Vec::new();
    client_end.receive(&mut frames);
    assert_eq!(frames.len(), 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut decoder = BatchDecoder::new(Arc::clone(h.server.registry()));
    decoder.add_handler(Box::new(HealthSink {
        registry: Arc::clone(h.server.registry()),
        seen: Arc::clone(&seen),
    }));
    for (index, frame) in frames.iter().enumerate() {
        decoder
            .try_receive(frame, 50 * (index as i64 + 1))
            .expect("server batch decodes cleanly");
    }
    assert_eq!(decoder.world_id(), 7);
    assert_eq!(decoder.remote_batch_id(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![(entity.id, Health(100))]);
}

#[test]
fn inbound_batches_reach_the_receive_handler() {
    let mut h = harness();
    let (server_end, client_end) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(2, 7), Box::new(server_end)));
    h.server.tick(1);

    // header (16 bytes) + one empty UpdateEntities message
    let mut frame = h.server.pool().rent(4 + 17);
    frame[..4].copy_from_slice(&17u32.to_le_bytes());
    frame[4..8].copy_from_slice(&7i32.to_le_bytes()); // world_id
    frame[8..10].copy_from_slice(&1u16.to_le_bytes()); // batch_id
    frame[10..12].copy_from_slice(&0u16.to_le_bytes()); // remote_ack
    frame[12..20].copy_from_slice(&10i64.to_le_bytes()); // time
    frame[20] = 4; // UpdateEntities
    assert!(client_end.send(frame));

    h.server.tick(1);
    assert_eq!(*h.received_ids.lock().unwrap(), vec![1]);
    assert_eq!(h.server.connections().len(), 1);
}

#[test]
fn a_closed_peer_is_evicted_and_reported() {
    let mut h = harness();
    let (server_end, client_end) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(3, 7), Box::new(server_end)));
    h.server.tick(1);
    assert_eq!(h.server.connections().len(), 1);

    client_end.close();
    h.server.tick(1);
    assert_eq!(h.server.connections().len(), 0);
    assert_eq!(*h.log.closed.lock().unwrap(), vec!["client-3"]);
}

#[test]
fn admission_rejections_close_the_transport() {
    let mut h = harness();

    // rejected by the admission layer itself: no ticket, no closed callback
    let (rejected_end, rejected_peer) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(0, 7), Box::new(rejected_end)));

    // ticket targets a world that does not exist
    let (lost_end, lost_peer) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(4, 9), Box::new(lost_end)));

    h.server.tick(1);
    assert_eq!(h.server.connections().len(), 0);
    assert_eq!(rejected_peer.state(), TransportState::Disconnected);
    assert_eq!(lost_peer.state(), TransportState::Disconnected);
    assert_eq!(*h.log.closed.lock().unwrap(), vec!["client-4"]);

    // duplicate connection ids are refused
    let (first, _first_peer) = ChannelTransport::pair(h.server.pool());
    let (second, second_peer) = ChannelTransport::pair(h.server.pool());
    assert!(h.server.queue_connection(key(5, 7), Box::new(first)));
    assert!(h.server.queue_connection(key(5, 7), Box::new(second)));
    h.server.tick(1);
    assert_eq!(h.server.connections().len(), 1);
    assert_eq!(second_peer.state(), TransportState::Disconnected);
}
