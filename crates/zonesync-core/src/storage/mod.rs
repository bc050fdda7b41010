// # Storage Implementations
//
// The authoritative datastore is owned by the API layer in production;
// the in-memory implementation here backs standalone mode and tests.

pub mod memory;

pub use memory::MemoryStorage;
