use crate::world::World;

/// A per-world simulation behavior run by the tick loop.
///
/// `update` runs once per tick on the simulation thread, after receive and
/// before the view/send phases. A panicking system is caught and logged; the
/// world keeps running and the system gets its next chance the following
/// tick.
pub trait WorldSystem: Send + Sync {
    /// Called once, on the world's first update.
    fn start(&mut self, world: &World) {
        let _ = world;
    }

    /// Called when the world is removed from the server.
    fn stop(&mut self, world: &World) {
        let _ = world;
    }

    fn update(&mut self, world: &World) {
        let _ = world;
    }
}
