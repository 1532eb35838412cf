//! Versioned response cache.
//!
//! A backend holds named stores; the worker only ever writes through a
//! [`CacheStore`] handle pinned to the current version's name.

mod layer;
mod storage;
mod traits;

pub use layer::CacheStore;
pub use storage::SqliteStorage;
pub use traits::{CacheEntry, CacheStorage, CachedResponse};
