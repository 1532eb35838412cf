//! Network access for the worker.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use url::{Origin, Url};

use crate::config::Config;
use crate::http::{Request, Response, ResponseType};

/// Something that can put a request on the wire.
///
/// An `Err` means the request never produced a response (offline, DNS,
/// timeout). HTTP error statuses are successful fetches.
pub trait Fetcher: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// reqwest-backed fetcher used outside of tests.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  origin: Origin,
}

impl HttpFetcher {
  pub fn new(config: &Config) -> Result<Self> {
    let origin = Url::parse(&config.site.origin)
      .map_err(|e| eyre!("Invalid site origin {}: {}", config.site.origin, e))?
      .origin();

    let client = reqwest::Client::builder()
      .timeout(config.network.timeout())
      .user_agent(concat!("llsw/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
      .map_err(|e| eyre!("Invalid method {}: {}", request.method, e))?;

    let mut builder = self.client.request(method, request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }

    let resp = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = resp.status();
    let final_url = resp.url().clone();
    let headers = resp
      .headers()
      .iter()
      .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
      .collect();
    let kind = if final_url.origin() == self.origin {
      ResponseType::Basic
    } else {
      ResponseType::Cors
    };

    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
      kind,
      url: Some(final_url.into()),
    })
  }
}
