//! Version-qualified handle onto a single named store.

use color_eyre::Result;
use std::sync::Arc;

use super::traits::{CacheEntry, CacheStorage, CachedResponse};
use crate::http::{Request, Response};

/// Handle that pins every read and write to one store name.
///
/// The worker holds exactly one of these, for the current version, so a
/// write can never land in a retired store.
pub struct CacheStore<S: CacheStorage> {
  storage: Arc<S>,
  name: String,
}

impl<S: CacheStorage> CacheStore<S> {
  /// Open (creating if needed) the store called `name`.
  pub fn open(storage: Arc<S>, name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    storage.open_store(&name)?;
    Ok(Self { storage, name })
  }

  /// Handle onto `name` without touching the backend.
  pub fn handle(storage: Arc<S>, name: impl Into<String>) -> Self {
    Self {
      storage,
      name: name.into(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn match_request(&self, request: &Request) -> Result<Option<CachedResponse>> {
    self.storage.match_entry(&self.name, &request.key())
  }

  pub fn put(&self, request: &Request, response: &Response) -> Result<()> {
    self.storage.put_entry(&self.name, &request.key(), response)
  }

  /// Write a whole batch atomically.
  pub fn put_all(&self, batch: Vec<(Request, Response)>) -> Result<()> {
    let keyed: Vec<_> = batch
      .into_iter()
      .map(|(request, response)| (request.key(), response))
      .collect();
    self.storage.put_entries(&self.name, &keyed)
  }

  pub fn entries(&self) -> Result<Vec<CacheEntry>> {
    self.storage.entries(&self.name)
  }
}

impl<S: CacheStorage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      name: self.name.clone(),
    }
  }
}
