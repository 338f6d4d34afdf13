//! Cache Store Adapters
//!
//! `CacheStorePort` implementations: Redis for production, in-memory for
//! development and tests.

mod memory;
mod redis;

pub use self::memory::InMemoryCacheStore;
pub use self::redis::RedisCacheStore;
