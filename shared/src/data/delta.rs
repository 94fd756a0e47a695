use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tether_cursor::{Pod, PodSlice};

use crate::data::buffer::DataBuffer;
use crate::data::data_type::DataTypeInfo;
use crate::data::error::DataError;
use crate::data::registry::DataRegistry;
use crate::types::EntityRef;

/// The three delta buffers of one entity.
///
/// *event* holds one-shot records, *persistent* the last-known value of every
/// persistent record, *persistent-change* the persistent writes since the
/// last clear. Event and persistent-change are transient: they are cleared
/// lazily the first time an access observes a newer tick than the one
/// recorded here, which implements "cleared every tick" without a global
/// sweep over all entities.
#[derive(Default)]
pub struct EntityDelta {
    pub event: DataBuffer,
    pub persistent: DataBuffer,
    pub persistent_change: DataBuffer,
    tick: u64,
}

impl EntityDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the transient buffers when `tick` has advanced past the last
    /// observed one.
    pub fn clear_transient(&mut self, tick: u64) {
        if self.tick == tick {
            return;
        }
        self.event.clear();
        self.persistent_change.clear();
        self.tick = tick;
    }

    pub fn write_event<T: Pod>(
        &mut self,
        tick: u64,
        info: &DataTypeInfo,
        value: &T,
    ) -> Result<(), DataError> {
        self.clear_transient(tick);
        self.event.write_event(info, value)
    }

    pub fn write_event_span<T: Pod>(
        &mut self,
        tick: u64,
        info: &DataTypeInfo,
        values: &[T],
    ) -> Result<(), DataError> {
        self.clear_transient(tick);
        self.event.write_event_span(info, values)
    }

    /// Updates the persistent record and mirrors the write into the
    /// persistent-change delta so existing observers receive it.
    pub fn write_persistent_change<T: Pod>(
        &mut self,
        tick: u64,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        value: &T,
    ) -> Result<(), DataError> {
        self.clear_transient(tick);
        self.persistent.write_persistent(registry, info, value)?;
        self.persistent_change
            .write_persistent(registry, info, value)
    }

    pub fn write_persistent_change_span<T: Pod>(
        &mut self,
        tick: u64,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        values: &[T],
    ) -> Result<(), DataError> {
        self.clear_transient(tick);
        self.persistent
            .write_persistent_span(registry, info, values)?;
        self.persistent_change
            .write_persistent_span(registry, info, values)
    }

    /// Updates the persistent record without recording a change: only
    /// newly-observing connections will see the value.
    pub fn write_persistent_only<T: Pod>(
        &mut self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        value: &T,
    ) -> Result<(), DataError> {
        self.persistent.write_persistent(registry, info, value)
    }

    pub fn write_persistent_only_span<T: Pod>(
        &mut self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
        values: &[T],
    ) -> Result<(), DataError> {
        self.persistent.write_persistent_span(registry, info, values)
    }

    pub fn try_read_persistent<T: Pod>(
        &self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
    ) -> Option<T> {
        self.persistent.try_read(registry, info)
    }

    pub fn try_read_persistent_span<T: Pod>(
        &self,
        registry: &DataRegistry,
        info: &DataTypeInfo,
    ) -> Option<PodSlice<'_, T>> {
        self.persistent.try_read_span(registry, info)
    }
}

/// Per-entity delta entries behind a per-entity lock.
///
/// The outer map has its own lock; each entry is locked individually because
/// simulation systems may push events from worker tasks while the send phase
/// reads the same entity's buffers.
#[derive(Default)]
pub struct EntityDeltaStore {
    entries: Mutex<HashMap<EntityRef, Arc<Mutex<EntityDelta>>>>,
}

impl EntityDeltaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the entity's delta entry, creating it on first write.
    pub fn get_or_create(&self, entity: EntityRef) -> Arc<Mutex<EntityDelta>> {
        let mut entries = self.entries.lock().expect("delta store lock poisoned");
        entries
            .entry(entity)
            .or_insert_with(|| Arc::new(Mutex::new(EntityDelta::new())))
            .clone()
    }

    pub fn get(&self, entity: EntityRef) -> Option<Arc<Mutex<EntityDelta>>> {
        let entries = self.entries.lock().expect("delta store lock poisoned");
        entries.get(&entity).cloned()
    }

    /// Drops the entity's entry; called on entity-destroyed notification.
    pub fn remove(&self, entity: EntityRef) -> bool {
        let mut entries = self.entries.lock().expect("delta store lock poisoned");
        entries.remove(&entity).is_some()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("delta store lock poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
