//! Routing decision for intercepted requests.

use color_eyre::{eyre::eyre, Result};
use std::fmt;
use tracing::debug;
use url::{Origin, Url};

use crate::config::SiteConfig;
use crate::http::{Method, Request};

/// What the controller does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Leave the request to the default network path
  Passthrough(PassReason),
  /// Top-level document load, network-first
  Navigation,
  /// Static asset, cache-first
  Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
  /// The worker is not controlling pages yet
  NotControlling,
  /// Neither our origin nor an allow-listed storage origin
  ForeignOrigin,
  /// Mutations always go to the network
  NonGet,
  /// Dynamic data is never served from the cache
  ApiPath,
}

impl fmt::Display for PassReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      PassReason::NotControlling => "worker not active",
      PassReason::ForeignOrigin => "foreign origin",
      PassReason::NonGet => "non-GET request",
      PassReason::ApiPath => "API path",
    };
    f.pad(label)
  }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
  origin: Origin,
  allowed_origins: Vec<Origin>,
  api_segment: String,
}

impl FetchPolicy {
  pub fn from_config(site: &SiteConfig) -> Result<Self> {
    let origin = parse_origin(&site.origin)?;
    let allowed_origins = site
      .allowed_origins
      .iter()
      .map(|o| parse_origin(o))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      origin,
      allowed_origins,
      api_segment: site.api_segment.clone(),
    })
  }

  pub fn route(&self, request: &Request) -> Route {
    let origin = request.url.origin();
    let route = if origin != self.origin && !self.allowed_origins.contains(&origin) {
      Route::Passthrough(PassReason::ForeignOrigin)
    } else if request.method != Method::Get {
      Route::Passthrough(PassReason::NonGet)
    } else if request.url.path().contains(&self.api_segment) {
      Route::Passthrough(PassReason::ApiPath)
    } else if request.is_navigation() {
      Route::Navigation
    } else {
      Route::Asset
    };

    debug!(key = %request.key(), ?route, "Routed request");
    route
  }
}

fn parse_origin(s: &str) -> Result<Origin> {
  let url = Url::parse(s).map_err(|e| eyre!("Invalid origin {}: {}", s, e))?;
  match url.origin() {
    origin @ Origin::Tuple(..) => Ok(origin),
    Origin::Opaque(_) => Err(eyre!("Origin {} is opaque", s)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy() -> FetchPolicy {
    FetchPolicy::from_config(&SiteConfig::default()).unwrap()
  }

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_foreign_origin_passes_through() {
    let req = Request::get(url("https://cdn.example.com/lib.js"));
    assert_eq!(
      policy().route(&req),
      Route::Passthrough(PassReason::ForeignOrigin)
    );
  }

  #[test]
  fn test_allow_listed_storage_origin_is_asset() {
    let req = Request::get(url("https://storage.liftlegends.com/assets/logo.png"));
    assert_eq!(policy().route(&req), Route::Asset);
  }

  #[test]
  fn test_non_get_passes_through() {
    for method in [Method::Post, Method::Put, Method::Delete, Method::Head] {
      let req = Request::get(url("https://liftlegends.com/checkout")).with_method(method);
      assert_eq!(policy().route(&req), Route::Passthrough(PassReason::NonGet));
    }
  }

  #[test]
  fn test_api_path_passes_through() {
    let req = Request::get(url("https://liftlegends.com/api/payments/session"));
    assert_eq!(policy().route(&req), Route::Passthrough(PassReason::ApiPath));

    let nav = Request::navigate(url("https://liftlegends.com/v1/api/programs"));
    assert_eq!(policy().route(&nav), Route::Passthrough(PassReason::ApiPath));
  }

  #[test]
  fn test_navigation_and_asset() {
    let nav = Request::navigate(url("https://liftlegends.com/blog"));
    assert_eq!(policy().route(&nav), Route::Navigation);

    let asset = Request::get(url("https://liftlegends.com/assets/app.js"));
    assert_eq!(policy().route(&asset), Route::Asset);
  }

  #[test]
  fn test_rejects_unparseable_origin() {
    let site = SiteConfig {
      origin: "not a url".to_string(),
      ..SiteConfig::default()
    };
    assert!(FetchPolicy::from_config(&site).is_err());
  }

  #[test]
  fn test_reason_label_pads() {
    assert_eq!(format!("{:<10}|", PassReason::ApiPath), "API path  |");
  }
}
