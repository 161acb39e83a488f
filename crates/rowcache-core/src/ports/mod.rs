//! Port traits (interfaces) for dependency injection

pub mod backend;
pub mod store;

pub use backend::BackingStore;
pub use store::KeyValueStore;
