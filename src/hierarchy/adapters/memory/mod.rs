//! In-memory adapters for hierarchy infrastructure ports.

mod identity;
mod store;

pub use identity::MemoryOwnerDirectory;
pub use store::MemoryForestStore;
