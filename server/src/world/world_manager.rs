use crate::world::world::{World, WorldError};

/// The set of worlds the server simulates.
///
/// Owned by the simulation thread; the parallel phases only ever take shared
/// references to individual worlds.
#[derive(Default)]
pub struct WorldManager {
    worlds: Vec<World>,
}

impl WorldManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a world. Ids must be unique among the live worlds.
    pub fn add(&mut self, world: World) -> Result<(), WorldError> {
        if self.contains(world.id()) {
            return Err(WorldError::DuplicateWorldId {
                world_id: world.id(),
            });
        }
        log::info!("world {} added", world.id());
        self.worlds.push(world);
        Ok(())
    }

    /// Removes the world, stopping its systems. Returns `false` when no such
    /// world exists.
    pub fn remove(&mut self, world_id: i32) -> bool {
        let Some(index) = self.worlds.iter().position(|w| w.id() == world_id) else {
            return false;
        };
        let mut world = self.worlds.remove(index);
        world.stop();
        log::info!("world {world_id} removed");
        true
    }

    pub fn contains(&self, world_id: i32) -> bool {
        self.worlds.iter().any(|w| w.id() == world_id)
    }

    pub fn get(&self, world_id: i32) -> Option<&World> {
        self.worlds.iter().find(|w| w.id() == world_id)
    }

    pub fn get_mut(&mut self, world_id: i32) -> Option<&mut World> {
        self.worlds.iter_mut().find(|w| w.id() == world_id)
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Runs one simulation tick over every world.
    pub fn update_all(&mut self) {
        for world in &mut self.worlds {
            world.update();
        }
    }

    /// Stops and drops every world; called on server shutdown.
    pub fn remove_all(&mut self) {
        for world in &mut self.worlds {
            world.stop();
        }
        self.worlds.clear();
    }
}
