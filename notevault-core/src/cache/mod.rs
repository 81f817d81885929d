pub mod invalidation;
pub mod key_builder;
pub mod kv;
pub mod manager;

pub use invalidation::{CacheInvalidationService, InvalidationMessage};
pub use key_builder::KeyBuilder;
pub use kv::{build_backend, Envelope, KvCache, MemoryKv, RedisKv};
pub use manager::CacheManager;
