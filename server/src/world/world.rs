use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use tether_shared::{
    DataError, DataRegistry, DataTypeInfo, EntityDelta, EntityDeltaStore, EntityRef, Pod,
};

use crate::scheduler::GateError;
use crate::time::SimTime;
use crate::world::entity_store::EntityStore;
use crate::world::system::WorldSystem;

/// Errors raised by world management
#[derive(Debug, Error)]
pub enum WorldError {
    /// Systems can only be added before the world's first update
    #[error("World {world_id} has already started; systems must be added before the first update")]
    AlreadyStarted { world_id: i32 },

    /// A world with this id is already registered
    #[error("World id {world_id} is already registered")]
    DuplicateWorldId { world_id: i32 },

    /// A structural change was attempted during a parallel phase
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// One simulated world: an entity store, its delta buffers, and the systems
/// that advance it.
///
/// All mutation happens on the simulation thread except the push operations,
/// which worker tasks may call concurrently — the delta store's per-entity
/// locks make that safe.
pub struct World {
    id: i32,
    registry: Arc<DataRegistry>,
    deltas: Arc<EntityDeltaStore>,
    store: Box<dyn EntityStore>,
    systems: Vec<Box<dyn WorldSystem>>,
    destroyed: Arc<Mutex<Vec<EntityRef>>>,
    time: Arc<SimTime>,
    started: bool,
}

impl World {
    pub fn new(
        id: i32,
        registry: Arc<DataRegistry>,
        mut store: Box<dyn EntityStore>,
        time: Arc<SimTime>,
    ) -> Self {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&destroyed);
        store.subscribe_destroyed(Box::new(move |entity| {
            sink.lock().expect("destroy queue lock poisoned").push(entity);
        }));
        Self {
            id,
            registry,
            deltas: Arc::new(EntityDeltaStore::new()),
            store,
            systems: Vec::new(),
            destroyed,
            time,
            started: false,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn registry(&self) -> &Arc<DataRegistry> {
        &self.registry
    }

    pub fn deltas(&self) -> &Arc<EntityDeltaStore> {
        &self.deltas
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    /// Registers a system. Fails once the world has run its first update.
    pub fn add_system(&mut self, system: Box<dyn WorldSystem>) -> Result<(), WorldError> {
        if self.started {
            return Err(WorldError::AlreadyStarted { world_id: self.id });
        }
        self.systems.push(system);
        Ok(())
    }

    /// Appends a one-shot event record for `entity`.
    pub fn push_event<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        value: &T,
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_event(self.time.tick(), info, value)
    }

    pub fn push_event_span<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        values: &[T],
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_event_span(self.time.tick(), info, values)
    }

    /// Updates the persistent record and records the change for existing
    /// observers.
    pub fn push_persistent<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        value: &T,
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_persistent_change(self.time.tick(), &self.registry, info, value)
    }

    pub fn push_persistent_span<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        values: &[T],
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_persistent_change_span(self.time.tick(), &self.registry, info, values)
    }

    /// Updates the persistent record without a change record: only
    /// newly-observing connections will receive the value.
    pub fn set_persistent<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        value: &T,
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_persistent_only(&self.registry, info, value)
    }

    pub fn set_persistent_span<T: Pod + 'static>(
        &self,
        entity: EntityRef,
        values: &[T],
    ) -> Result<(), DataError> {
        let info = self.info_of::<T>()?;
        let delta = self.live_delta(entity)?;
        let mut delta = delta.lock().expect("entity delta lock poisoned");
        delta.write_persistent_only_span(&self.registry, info, values)
    }

    /// Reads back the last persistent value written for `entity`.
    pub fn try_get_persistent<T: Pod + 'static>(&self, entity: EntityRef) -> Option<T> {
        let info = self.registry.get_of::<T>()?;
        let delta = self.deltas.get(entity)?;
        let delta = delta.lock().expect("entity delta lock poisoned");
        delta.try_read_persistent(&self.registry, info)
    }

    pub fn try_get_persistent_span<T: Pod + 'static>(&self, entity: EntityRef) -> Option<Vec<T>> {
        let info = self.registry.get_of::<T>()?;
        let delta = self.deltas.get(entity)?;
        let delta = delta.lock().expect("entity delta lock poisoned");
        let span = delta.try_read_persistent_span(&self.registry, info)?;
        Some(span.to_vec())
    }

    /// The delta entry for `entity`, if one has been written. Used by the
    /// send phase.
    pub(crate) fn delta_of(&self, entity: EntityRef) -> Option<Arc<Mutex<EntityDelta>>> {
        self.deltas.get(entity)
    }

    /// Runs one tick: destroyed entities lose their delta entries, then the
    /// systems run (start on the first update).
    pub fn update(&mut self) {
        let destroyed = {
            let mut queue = self.destroyed.lock().expect("destroy queue lock poisoned");
            std::mem::take(&mut *queue)
        };
        for entity in destroyed {
            self.deltas.remove(entity);
        }

        if !self.started {
            self.started = true;
            self.run_systems(|system, world| system.start(world));
        }
        self.run_systems(|system, world| system.update(world));
    }

    /// Called when the world leaves the server.
    pub(crate) fn stop(&mut self) {
        if self.started {
            self.run_systems(|system, world| system.stop(world));
        }
    }

    fn run_systems(&mut self, mut call: impl FnMut(&mut dyn WorldSystem, &World)) {
        // systems step aside so they can borrow the world they run against
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            let outcome = catch_unwind(AssertUnwindSafe(|| call(system.as_mut(), self)));
            if outcome.is_err() {
                log::error!("system panicked in world {}; continuing", self.id);
            }
        }
        self.systems = systems;
    }

    fn info_of<T: Pod + 'static>(&self) -> Result<&DataTypeInfo, DataError> {
        self.registry.get_of::<T>().ok_or(DataError::NotRegistered {
            type_name: std::any::type_name::<T>(),
        })
    }

    fn live_delta(&self, entity: EntityRef) -> Result<Arc<Mutex<EntityDelta>>, DataError> {
        if !self.store.is_alive(entity) {
            return Err(DataError::EntityNotFound { entity });
        }
        Ok(self.deltas.get_or_create(entity))
    }
}
