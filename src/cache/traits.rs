//! Core traits and types for the response cache.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::{RequestKey, Response};

/// A response read back from a store.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
  /// SHA-256 of the body, hex encoded
  pub digest: String,
}

/// Summary row for listing a store without loading bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub key: RequestKey,
  pub status: u16,
  pub size: usize,
  pub digest: String,
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// A backend holds any number of named stores. Writes are last-writer-wins
/// per key; nothing reads-modifies-writes an entry.
pub trait CacheStorage: Send + Sync {
  /// Create the named store if it does not exist yet.
  fn open_store(&self, name: &str) -> Result<()>;

  /// Names of every store, in creation order.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Delete a store and all of its entries. Returns whether it existed.
  fn delete_store(&self, name: &str) -> Result<bool>;

  /// Look up a single entry.
  fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Write an entry, creating the store if needed.
  fn put_entry(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Write several entries to one store; either all land or none do.
  fn put_entries(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// Record that the store took control of pages. No-op if it does not exist.
  fn mark_activated(&self, name: &str) -> Result<()>;

  /// Whether the store was activated and has not been deleted since.
  fn is_activated(&self, name: &str) -> Result<bool>;

  /// List the entries of a store.
  fn entries(&self, store: &str) -> Result<Vec<CacheEntry>>;
}
