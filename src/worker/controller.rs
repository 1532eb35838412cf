//! Offline cache controller: install, activate and fetch handling.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::policy::{FetchPolicy, PassReason, Route};
use crate::cache::{CacheStorage, CacheStore};
use crate::config::Config;
use crate::http::{Request, Response, ResponseSource};
use crate::net::Fetcher;

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, install not attempted yet
  Parsed,
  Installing,
  /// Installed, waiting to take over from the previous version
  Waiting,
  Active,
  /// Install failed; this version will never control pages
  Redundant,
}

/// Result of handling one intercepted fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
  /// Not intercepted, the caller performs the default fetch
  Passthrough(PassReason),
  Respond {
    response: Response,
    source: ResponseSource,
  },
}

impl FetchOutcome {
  pub fn response(&self) -> Option<&Response> {
    match self {
      FetchOutcome::Passthrough(_) => None,
      FetchOutcome::Respond { response, .. } => Some(response),
    }
  }

  pub fn source(&self) -> Option<ResponseSource> {
    match self {
      FetchOutcome::Passthrough(_) => None,
      FetchOutcome::Respond { source, .. } => Some(*source),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct InstallReport {
  pub cached: Vec<String>,
  /// URL and reason for every asset that could not be stored
  pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivateReport {
  pub deleted: Vec<String>,
  pub clients_claimed: bool,
}

pub struct OfflineCacheController<S: CacheStorage, F: Fetcher> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  policy: FetchPolicy,
  current: CacheStore<S>,
  offline_page: Url,
  precache_urls: Vec<Url>,
  tolerate_failures: bool,
  state: WorkerState,
  clients_claimed: bool,
}

impl<S: CacheStorage, F: Fetcher> OfflineCacheController<S, F> {
  pub fn from_config(config: &Config, storage: Arc<S>, fetcher: Arc<F>) -> Result<Self> {
    let policy = FetchPolicy::from_config(&config.site)?;
    let origin = Url::parse(&config.site.origin)
      .map_err(|e| eyre!("Invalid site origin {}: {}", config.site.origin, e))?;
    let resolve = |u: &str| {
      origin
        .join(u)
        .map_err(|e| eyre!("Invalid precache URL {}: {}", u, e))
    };

    let offline_page = resolve(&config.site.offline_page)?;
    let precache_urls = config
      .precache
      .urls
      .iter()
      .map(|u| resolve(u))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      current: CacheStore::handle(Arc::clone(&storage), config.cache.store_name()),
      storage,
      fetcher,
      policy,
      offline_page,
      precache_urls,
      tolerate_failures: config.precache.tolerate_failures,
      state: WorkerState::Parsed,
      clients_claimed: false,
    })
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn clients_claimed(&self) -> bool {
    self.clients_claimed
  }

  pub fn current_store(&self) -> &CacheStore<S> {
    &self.current
  }

  /// Pick up a version activated by an earlier run. Returns whether the
  /// current store was activated and the worker is now active.
  ///
  /// A store left behind by a failed install is never picked up.
  pub fn resume(&mut self) -> Result<bool> {
    if !self.storage.is_activated(self.current.name())? {
      return Ok(false);
    }

    let names = self.storage.store_names()?;
    if names.len() > 1 {
      debug!(stores = names.len(), "Stale stores remain until next activation");
    }
    self.state = WorkerState::Active;
    self.clients_claimed = true;
    Ok(true)
  }

  /// Open the current store and pre-populate it from the manifest.
  pub async fn install(&mut self) -> Result<InstallReport> {
    self.state = WorkerState::Installing;
    info!(store = self.current.name(), "Installing");

    let name = self.current.name().to_string();
    let result = match CacheStore::open(Arc::clone(&self.storage), name) {
      Ok(store) => {
        self.current = store;
        self.populate().await
      }
      Err(e) => Err(e),
    };

    match result {
      Ok(report) => {
        self.state = WorkerState::Waiting;
        info!(
          cached = report.cached.len(),
          failed = report.failed.len(),
          "Installed"
        );
        Ok(report)
      }
      Err(e) => {
        self.state = WorkerState::Redundant;
        warn!("Install failed: {}", e);
        Err(e)
      }
    }
  }

  /// Re-fetch the manifest into the current store of an installed worker.
  pub async fn precache(&self) -> Result<InstallReport> {
    if !matches!(self.state, WorkerState::Waiting | WorkerState::Active) {
      return Err(eyre!("Cannot precache a worker in state {:?}", self.state));
    }
    self.populate().await
  }

  /// Fetch every manifest URL and write the responses to the current store.
  ///
  /// Unless failures are tolerated, the batch is written in one transaction
  /// and only when every asset fetched with a 2xx status.
  async fn populate(&self) -> Result<InstallReport> {
    let fetches = self.precache_urls.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let result = match self.fetcher.fetch(&request).await {
        Ok(resp) if resp.is_ok() => Ok(resp),
        Ok(resp) => Err(eyre!("{} answered {}", url, resp.status)),
        Err(e) => Err(e),
      };
      (request, result)
    });
    let results = join_all(fetches).await;

    let mut report = InstallReport::default();

    if self.tolerate_failures {
      for (request, result) in results {
        let url = request.url.to_string();
        match result.and_then(|resp| self.current.put(&request, &resp)) {
          Ok(()) => report.cached.push(url),
          Err(e) => {
            warn!(url = %url, "Skipping precache asset: {}", e);
            report.failed.push((url, e.to_string()));
          }
        }
      }
      return Ok(report);
    }

    let total = results.len();
    let mut batch = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for (request, result) in results {
      match result {
        Ok(resp) => batch.push((request, resp)),
        Err(e) => errors.push(e),
      }
    }

    if let Some(e) = errors.first() {
      return Err(eyre!(
        "Precache failed for {} of {} URLs: {}",
        errors.len(),
        total,
        e
      ));
    }

    report.cached = batch.iter().map(|(r, _)| r.url.to_string()).collect();
    self.current.put_all(batch)?;
    Ok(report)
  }

  /// Delete every store but the current one, then take control of open pages.
  pub fn activate(&mut self) -> Result<ActivateReport> {
    if !matches!(self.state, WorkerState::Waiting | WorkerState::Active) {
      return Err(eyre!("Cannot activate a worker in state {:?}", self.state));
    }

    let mut report = ActivateReport::default();
    for name in self.storage.store_names()? {
      if name == self.current.name() {
        continue;
      }
      if self.storage.delete_store(&name)? {
        info!(store = %name, "Deleted stale store");
        report.deleted.push(name);
      }
    }

    self.storage.mark_activated(self.current.name())?;
    self.clients_claimed = true;
    self.state = WorkerState::Active;
    report.clients_claimed = true;
    info!(store = self.current.name(), "Activated");

    Ok(report)
  }

  /// Handle one intercepted request. Never fails: every error degrades to a
  /// cached copy, the offline page or a synthetic response.
  pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
    if self.state != WorkerState::Active {
      return FetchOutcome::Passthrough(PassReason::NotControlling);
    }

    match self.policy.route(request) {
      Route::Passthrough(reason) => FetchOutcome::Passthrough(reason),
      Route::Navigation => self.network_first(request).await,
      Route::Asset => self.cache_first(request).await,
    }
  }

  async fn network_first(&self, request: &Request) -> FetchOutcome {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if let Err(e) = self.current.put(request, &response) {
          warn!(key = %request.key(), "Failed to cache navigation: {}", e);
        }
        respond(response, ResponseSource::Network)
      }
      Err(e) => {
        warn!(key = %request.key(), "Navigation failed, serving fallback: {}", e);
        if let Some(cached) = self.lookup(request) {
          return respond(cached, ResponseSource::Cache);
        }
        if let Some(offline) = self.lookup(&Request::get(self.offline_page.clone())) {
          return respond(offline, ResponseSource::OfflinePage);
        }
        warn!("Offline page {} is not cached", self.offline_page);
        respond(Response::network_error(), ResponseSource::Synthetic)
      }
    }
  }

  async fn cache_first(&self, request: &Request) -> FetchOutcome {
    if let Some(cached) = self.lookup(request) {
      return respond(cached, ResponseSource::Cache);
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_storable_asset() {
          if let Err(e) = self.current.put(request, &response) {
            warn!(key = %request.key(), "Failed to cache asset: {}", e);
          }
        } else {
          debug!(key = %request.key(), status = response.status, "Not caching asset");
        }
        respond(response, ResponseSource::Network)
      }
      Err(e) => {
        warn!(key = %request.key(), "Asset fetch failed: {}", e);
        respond(Response::network_error(), ResponseSource::Synthetic)
      }
    }
  }

  /// Store lookup where a storage error counts as a miss.
  fn lookup(&self, request: &Request) -> Option<Response> {
    match self.current.match_request(request) {
      Ok(hit) => hit.map(|c| c.response),
      Err(e) => {
        warn!(key = %request.key(), "Cache lookup failed: {}", e);
        None
      }
    }
  }
}

fn respond(response: Response, source: ResponseSource) -> FetchOutcome {
  FetchOutcome::Respond { response, source }
}
