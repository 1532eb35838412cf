use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub site: SiteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub precache: PrecacheConfig,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub pull: PullSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
  /// Origin the worker is registered for
  pub origin: String,
  /// Remote storage origins whose assets are cached alongside our own
  pub allowed_origins: Vec<String>,
  /// Requests whose path contains this segment are never intercepted
  pub api_segment: String,
  /// Document served for failed navigations
  pub offline_page: String,
}

impl Default for SiteConfig {
  fn default() -> Self {
    Self {
      origin: "https://liftlegends.com".to_string(),
      allowed_origins: vec!["https://storage.liftlegends.com".to_string()],
      api_segment: "/api/".to_string(),
      offline_page: "/offline.html".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub prefix: String,
  /// Deployed version; bumping it retires every older store on activation
  pub version: String,
  /// Database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "liftlegends-cache".to_string(),
      version: "v2".to_string(),
      path: None,
    }
  }
}

impl CacheConfig {
  /// Name of the one store writes are allowed to target.
  pub fn store_name(&self) -> String {
    format!("{}-{}", self.prefix, self.version)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
  /// URLs fetched and stored on install, relative ones resolve against the site origin
  pub urls: Vec<String>,
  /// Store what succeeded instead of failing the whole install
  pub tolerate_failures: bool,
}

impl Default for PrecacheConfig {
  fn default() -> Self {
    let urls = [
      "/",
      "/index.html",
      "/offline.html",
      "/manifest.json",
      "/favicon.ico",
      "/favicon-16x16.png",
      "/favicon-32x32.png",
      "/apple-touch-icon.png",
      "https://storage.liftlegends.com/assets/logo.png",
      "/blog",
      "/programs",
      "/about-us",
      "/download",
    ];
    Self {
      urls: urls.iter().map(|u| u.to_string()).collect(),
      tolerate_failures: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  pub timeout_secs: u64,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self { timeout_secs: 30 }
  }
}

impl NetworkConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PullSettings {
  pub threshold: f64,
  pub resistance: f64,
  pub enabled: bool,
  /// Abandon a refresh that runs longer than this
  pub refresh_timeout_ms: Option<u64>,
  /// Pixels represented by one terminal row in the inspector
  pub pixels_per_row: f64,
}

impl Default for PullSettings {
  fn default() -> Self {
    Self {
      threshold: 80.0,
      resistance: 2.5,
      enabled: true,
      refresh_timeout_ms: None,
      pixels_per_row: 16.0,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./liftlegends.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/liftlegends/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("liftlegends.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("liftlegends").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.version.trim().is_empty() {
      return Err(eyre!("cache.version must not be empty"));
    }
    if self.site.api_segment.is_empty() {
      return Err(eyre!("site.api_segment must not be empty"));
    }
    if self.pull.resistance <= 0.0 {
      return Err(eyre!("pull.resistance must be positive"));
    }
    if self.pull.threshold <= 0.0 {
      return Err(eyre!("pull.threshold must be positive"));
    }
    if self.pull.pixels_per_row <= 0.0 {
      return Err(eyre!("pull.pixels_per_row must be positive"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults_match_deployed_site() {
    let config = Config::default();
    assert_eq!(config.cache.store_name(), "liftlegends-cache-v2");
    assert_eq!(config.site.api_segment, "/api/");
    assert_eq!(config.pull.threshold, 80.0);
    assert_eq!(config.pull.resistance, 2.5);
    assert!(!config.precache.tolerate_failures);
    assert!(config.precache.urls.iter().any(|u| u == "/offline.html"));
    assert!(config.precache.urls.iter().any(|u| u == "/about-us"));
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
      file,
      "cache:\n  version: v3\npull:\n  threshold: 100\n  refresh_timeout_ms: 5000"
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache.store_name(), "liftlegends-cache-v3");
    assert_eq!(config.pull.threshold, 100.0);
    assert_eq!(config.pull.resistance, 2.5);
    assert_eq!(config.pull.refresh_timeout_ms, Some(5000));
    assert_eq!(config.site.origin, "https://liftlegends.com");
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/liftlegends.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_rejects_non_positive_resistance() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "pull:\n  resistance: 0").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("resistance"));
  }
}
