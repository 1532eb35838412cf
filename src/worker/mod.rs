//! Service-worker style offline cache controller.
//!
//! - Navigations are network-first, falling back to the cached copy and
//!   then to the offline page
//! - Other same-origin and allow-listed GETs are cache-first
//! - Non-GET, API and foreign requests are never intercepted
//! - Activation retires every store but the current version's

mod controller;
mod policy;

pub use controller::{
  ActivateReport, FetchOutcome, InstallReport, OfflineCacheController, WorkerState,
};
pub use policy::{FetchPolicy, PassReason, Route};
