//! phloem backend adapters
//!
//! Implementations of the [`phloem_core::Db`] capability contract, and the
//! registry that selects one by name at configuration time.

pub mod memory;
pub mod null;
pub mod redis;
pub mod registry;

pub use memory::{MemoryDb, MemoryFactory};
pub use null::{NullDb, NullFactory};
pub use redis::{RedisDb, RedisFactory, RedisSettings};
pub use registry::BackendRegistry;
