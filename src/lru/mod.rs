//! Provides a size constrained LRU cache.
//!
//! An LRU cache behaves just like a **Map** as long as there is no shortage in storage. Once the
//! accounted memory grows beyond the configured limit, old (least recently used) entries are
//! evicted - hence the name LRU cache. Eviction is purely capacity driven, there is no age or
//! TTL based expiry.
//!
//! The cache can store all kinds of values for which the [ByteSize] trait is implemented. Each
//! entry is accounted with the length of its key plus the allocated size of its value.
//!
//! Note that [LruCache] itself operates on `&mut self` and performs no locking. Within this crate
//! each [Group](crate::group::Group) wraps its cache in a mutex, which makes all reads and writes
//! mutually exclusive and keeps the recency list and the size counter consistent.
mod lru_cache;

pub use lru_cache::ByteSize;
pub use lru_cache::LruCache;
