//! Backing-store seam shared by both connectors

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::ResultStore;
