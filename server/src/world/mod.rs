mod entity_store;
mod system;
mod world;
mod world_manager;

pub use entity_store::{DestroyedCallback, EntityStore, LocalEntityStore};
pub use system::WorldSystem;
pub use world::{World, WorldError};
pub use world_manager::WorldManager;
