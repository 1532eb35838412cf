//! Request and response model shared by the fetch policy, the network client and storage.

use color_eyre::{eyre::eyre, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
      Method::Options => "OPTIONS",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

impl FromStr for Method {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "HEAD" => Ok(Method::Head),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      "OPTIONS" => Ok(Method::Options),
      other => Err(eyre!("Unsupported HTTP method: {}", other)),
    }
  }
}

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level document load (address bar, link click, reload)
  Navigate,
  /// Anything the page loads on its own: scripts, images, XHR
  Subresource,
}

/// An outgoing request as seen by the worker.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
  pub headers: Vec<(String, String)>,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      mode: RequestMode::Subresource,
      headers: Vec::new(),
    }
  }

  pub fn navigate(url: Url) -> Self {
    Self {
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Identity used for cache lookups.
  pub fn key(&self) -> RequestKey {
    RequestKey::new(self.method, &self.url)
  }
}

/// Cache identity of a request: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  pub method: Method,
  pub url: String,
}

impl RequestKey {
  pub fn new(method: Method, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self {
      method,
      url: url.into(),
    }
  }
}

impl fmt::Display for RequestKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// Response tainting, mirroring what the platform reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
  /// Same-origin response
  Basic,
  /// Cross-origin response with CORS
  Cors,
  /// Cross-origin response without CORS
  Opaque,
  /// Constructed locally, never touched the network
  Default,
}

impl ResponseType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResponseType::Basic => "basic",
      ResponseType::Cors => "cors",
      ResponseType::Opaque => "opaque",
      ResponseType::Default => "default",
    }
  }
}

impl FromStr for ResponseType {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "basic" => Ok(ResponseType::Basic),
      "cors" => Ok(ResponseType::Cors),
      "opaque" => Ok(ResponseType::Opaque),
      "default" => Ok(ResponseType::Default),
      other => Err(eyre!("Unknown response type: {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub kind: ResponseType,
  /// Final URL after redirects, absent for constructed responses
  pub url: Option<String>,
}

impl Response {
  /// Last-resort answer for a sub-resource that is neither cached nor reachable.
  pub fn network_error() -> Self {
    Self {
      status: 408,
      status_text: "Request Timeout".to_string(),
      headers: vec![("content-type".to_string(), "text/plain".to_string())],
      body: b"Network error occurred".to_vec(),
      kind: ResponseType::Default,
      url: None,
    }
  }

  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Whether a cache-first miss may be written back to the store.
  pub fn is_storable_asset(&self) -> bool {
    self.status == 200 && self.kind == ResponseType::Basic
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Where the response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  Network,
  Cache,
  OfflinePage,
  Synthetic,
}

impl fmt::Display for ResponseSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ResponseSource::Network => "network",
      ResponseSource::Cache => "cache",
      ResponseSource::OfflinePage => "offline page",
      ResponseSource::Synthetic => "synthetic",
    };
    f.pad(label)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_ignores_fragment() {
    let a = Request::get(Url::parse("https://liftlegends.com/blog#top").unwrap());
    let b = Request::get(Url::parse("https://liftlegends.com/blog").unwrap());
    assert_eq!(a.key(), b.key());
    assert_eq!(a.key().to_string(), "GET https://liftlegends.com/blog");
  }

  #[test]
  fn test_key_distinguishes_method() {
    let url = Url::parse("https://liftlegends.com/blog").unwrap();
    let get = Request::get(url.clone());
    let head = Request::get(url).with_method(Method::Head);
    assert_ne!(get.key(), head.key());
  }

  #[test]
  fn test_method_parse_is_case_insensitive() {
    assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
    assert!("BREW".parse::<Method>().is_err());
  }

  #[test]
  fn test_labels_honor_width() {
    assert_eq!(format!("{:<7}|", Method::Get), "GET    |");
    assert_eq!(format!("{:>8}", ResponseSource::Cache), "   cache");
  }

  #[test]
  fn test_network_error_response() {
    let resp = Response::network_error();
    assert_eq!(resp.status, 408);
    assert_eq!(resp.body, b"Network error occurred");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert!(!resp.is_storable_asset());
  }
}
