use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tether_shared::EntityRef;

use crate::scheduler::{GateError, MutationGate};

pub type DestroyedCallback = Box<dyn Fn(EntityRef) + Send + Sync>;

/// The opaque entity storage collaborator.
///
/// The core never owns entities; it checks liveness before accepting writes
/// and reacts to destruction through the subscription so delta entries are
/// dropped with their entity.
pub trait EntityStore: Send + Sync {
    fn is_alive(&self, entity: EntityRef) -> bool;

    /// Registers a callback fired for every destroyed entity. Called once per
    /// world at construction.
    fn subscribe_destroyed(&mut self, callback: DestroyedCallback);
}

/// A minimal in-memory entity store for tests and standalone worlds.
///
/// Structural changes check the mutation gate; a full storage engine plugged
/// in through [`EntityStore`] is expected to do the same.
pub struct LocalEntityStore {
    gate: Arc<MutationGate>,
    alive: Mutex<HashMap<i32, i32>>,
    next_id: Mutex<i32>,
    callbacks: Mutex<Vec<DestroyedCallback>>,
}

impl LocalEntityStore {
    pub fn new(gate: Arc<MutationGate>) -> Self {
        Self {
            gate,
            alive: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn create(&self) -> Result<EntityRef, GateError> {
        self.gate.require_open()?;
        let mut next_id = self.next_id.lock().expect("entity store lock poisoned");
        let id = *next_id;
        *next_id += 1;
        self.alive
            .lock()
            .expect("entity store lock poisoned")
            .insert(id, 1);
        Ok(EntityRef::new(id, 1))
    }

    /// Destroys the entity and fires the destroyed subscriptions. Returns
    /// `false` when the reference was already dead.
    pub fn destroy(&self, entity: EntityRef) -> Result<bool, GateError> {
        self.gate.require_open()?;
        let removed = {
            let mut alive = self.alive.lock().expect("entity store lock poisoned");
            match alive.get(&entity.id) {
                Some(version) if *version == entity.version => {
                    alive.remove(&entity.id);
                    true
                }
                _ => false,
            }
        };
        if removed {
            let callbacks = self.callbacks.lock().expect("entity store lock poisoned");
            for callback in callbacks.iter() {
                callback(entity);
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.alive.lock().expect("entity store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityStore for LocalEntityStore {
    fn is_alive(&self, entity: EntityRef) -> bool {
        let alive = self.alive.lock().expect("entity store lock poisoned");
        alive.get(&entity.id) == Some(&entity.version)
    }

    fn subscribe_destroyed(&mut self, callback: DestroyedCallback) {
        self.callbacks
            .lock()
            .expect("entity store lock poisoned")
            .push(callback);
    }
}

// lets the application keep a creating/destroying handle while the world
// owns the boxed collaborator
impl EntityStore for Arc<LocalEntityStore> {
    fn is_alive(&self, entity: EntityRef) -> bool {
        self.as_ref().is_alive(entity)
    }

    fn subscribe_destroyed(&mut self, callback: DestroyedCallback) {
        self.callbacks
            .lock()
            .expect("entity store lock poisoned")
            .push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_structural_changes() {
        let gate = MutationGate::new();
        let store = LocalEntityStore::new(Arc::clone(&gate));

        let entity = store.create().unwrap();
        {
            let _scope = gate.close();
            assert_eq!(store.create(), Err(GateError::ChangesDisallowed));
            assert_eq!(store.destroy(entity), Err(GateError::ChangesDisallowed));
        }
        assert_eq!(store.destroy(entity), Ok(true));
        assert_eq!(store.destroy(entity), Ok(false));
    }

    #[test]
    fn destroy_notifies_subscribers() {
        let gate = MutationGate::new();
        let mut store = LocalEntityStore::new(gate);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe_destroyed(Box::new(move |entity| sink.lock().unwrap().push(entity)));

        let entity = store.create().unwrap();
        assert!(store.is_alive(entity));
        store.destroy(entity).unwrap();
        assert!(!store.is_alive(entity));
        assert_eq!(*seen.lock().unwrap(), vec![entity]);
    }
}
