mod app;
mod event;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use url::Url;

use liftlegends_sw::cache::{CacheStorage, SqliteStorage};
use liftlegends_sw::config::{CacheConfig, Config};
use liftlegends_sw::http::{Method, Request};
use liftlegends_sw::net::{Fetcher, HttpFetcher};
use liftlegends_sw::worker::{FetchOutcome, OfflineCacheController};

#[derive(Parser, Debug)]
#[command(name = "llsw")]
#[command(about = "Offline cache controller for the LiftLegends site")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/liftlegends/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache version to operate on, overriding the config
  #[arg(long)]
  version_tag: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the manifest into the current version's store
  Install,
  /// Install, then retire every other store and take control
  Activate,
  /// Run one request through the fetch handler
  Fetch {
    /// Absolute URL, or a path on the site origin
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Treat the request as a top-level navigation
    #[arg(short, long)]
    navigate: bool,
    /// Print the response body to stdout
    #[arg(short, long)]
    body: bool,
  },
  /// List stores and their entry counts
  Stores,
  /// Browse the current store; drag down to refresh
  Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let config = if let Some(version) = args.version_tag {
    Config {
      cache: CacheConfig {
        version,
        ..config.cache
      },
      ..config
    }
  } else {
    config
  };

  let _guard = init_tracing(matches!(args.command, Command::Inspect))?;

  let storage = Arc::new(SqliteStorage::open(config.cache.path.as_deref())?);
  let fetcher = Arc::new(HttpFetcher::new(&config)?);
  let mut controller =
    OfflineCacheController::from_config(&config, Arc::clone(&storage), Arc::clone(&fetcher))?;

  match args.command {
    Command::Install => {
      let report = controller.install().await?;
      println!(
        "Installed {}: {} cached, {} failed",
        controller.current_store().name(),
        report.cached.len(),
        report.failed.len()
      );
      for (url, reason) in &report.failed {
        println!("  failed {}: {}", url, reason);
      }
    }
    Command::Activate => {
      controller.install().await?;
      let report = controller.activate()?;
      println!("Activated {}", controller.current_store().name());
      for name in &report.deleted {
        println!("  deleted {}", name);
      }
    }
    Command::Fetch {
      url,
      method,
      navigate,
      body,
    } => {
      require_active(&mut controller)?;

      let url = Url::parse(&config.site.origin)
        .and_then(|origin| origin.join(&url))
        .map_err(|e| eyre!("Invalid URL {}: {}", url, e))?;
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      };
      let request = request.with_method(method.parse::<Method>()?);

      let (response, source) = match controller.handle_fetch(&request).await {
        FetchOutcome::Respond { response, source } => (response, source.to_string()),
        FetchOutcome::Passthrough(reason) => (
          fetcher.fetch(&request).await?,
          format!("passthrough: {}", reason),
        ),
      };

      eprintln!(
        "{} {} ({}, {} bytes)",
        response.status,
        response.status_text,
        source,
        response.body.len()
      );
      if body {
        println!("{}", String::from_utf8_lossy(&response.body));
      }
    }
    Command::Stores => {
      let current = controller.current_store().name().to_string();
      for name in storage.store_names()? {
        let marker = if name == current { "*" } else { " " };
        println!("{} {} ({} entries)", marker, name, storage.entries(&name)?.len());
      }
    }
    Command::Inspect => {
      require_active(&mut controller)?;
      let mut app = app::App::new(&config, controller);
      app.run().await?;
    }
  }

  Ok(())
}

/// Resume the current version, refusing versions that never activated.
fn require_active(
  controller: &mut OfflineCacheController<SqliteStorage, HttpFetcher>,
) -> Result<()> {
  if !controller.resume()? {
    return Err(eyre!(
      "{} was never activated; run `llsw activate` first",
      controller.current_store().name()
    ));
  }
  Ok(())
}

/// Log to stderr, or to a daily file while the terminal UI owns the screen.
fn init_tracing(to_file: bool) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  if !to_file {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    return Ok(None);
  }

  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("liftlegends")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "llsw.log"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(Some(guard))
}
