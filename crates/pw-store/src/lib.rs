pub mod repository;
pub mod memory;

pub use repository::{CharacterStore, MetadataStore, StatStore, LocalStores};
pub use memory::MemoryStore;
