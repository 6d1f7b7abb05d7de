//! Archival memory and task-tracking backends for openshrimp.
//!
//! Both are in-process stores: the agent talks to them through the
//! `MemoryBackend` and `TaskStore` traits, so a database-backed service can
//! replace them without touching the loop.

pub mod noop;
pub mod in_memory;
pub mod task_store;

pub use noop::NoopMemory;
pub use in_memory::InMemoryBackend;
pub use task_store::InMemoryTaskStore;
