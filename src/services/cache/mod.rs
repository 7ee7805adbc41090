pub mod client;
pub mod memory;
pub mod valkey;

pub use client::{CacheClient, CacheError, CacheResult, ttl_seconds};
pub use memory::InMemoryCache;
pub use valkey::ValkeyClient;
