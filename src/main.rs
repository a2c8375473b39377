use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use urlsync::config::Config;
use urlsync::history::MemoryHistory;
use urlsync::http::{HttpClient, RelativeHttpClient, ReqwestClient};
use urlsync::query::QueryMap;
use urlsync::repository::UrlDataRepository;
use urlsync::sync::{CursorPage, CursorPaginatedSync, SyncConfig, SyncController};

#[derive(Parser, Debug)]
#[command(name = "urlsync")]
#[command(about = "Load the data behind a URL and keep it in sync with its query")]
#[command(version)]
struct Args {
  /// Location to load, e.g. "/users?page=2" or "/#/users?page=2"
  location: String,

  /// Path to config file (default: $XDG_CONFIG_HOME/urlsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL for requests, overriding the config file
  #[arg(short, long)]
  base_url: Option<String>,

  /// Query value to write into the URL before loading (repeatable)
  #[arg(short = 's', long = "set", value_name = "KEY=VALUE", value_parser = parse_pair)]
  set: Vec<(String, String)>,

  /// Treat the response as a cursor-paginated list
  #[arg(long)]
  paginated: bool,

  /// Number of pages to walk forward with --paginated
  #[arg(long, default_value_t = 1)]
  pages: usize,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
  raw
    .split_once('=')
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .filter(|(key, _)| !key.is_empty())
    .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  let Some(path) = log_file else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .with_target(false)
      .init();
    return Ok(None);
  };

  let directory = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or(Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(Some(guard))
}

fn build_client(config: &Config) -> Result<Box<dyn HttpClient>> {
  let client = ReqwestClient::from_config(config)?;
  Ok(match &config.origin {
    Some(origin) => Box::new(RelativeHttpClient::with_prefix(
      origin.clone(),
      config.api_prefix.clone(),
      client,
    )),
    None => Box::new(client),
  })
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn load_once(
  repository: UrlDataRepository<Value, Box<dyn HttpClient>, MemoryHistory>,
  sync_config: SyncConfig,
  fragment: QueryMap,
) -> Result<()> {
  let mut controller = SyncController::new(Arc::new(repository), sync_config);
  controller.start().await?;
  if !fragment.is_empty() && !controller.append_query(fragment).await? {
    controller.get_data();
  }
  controller.settle().await;

  if let Some(error) = controller.error() {
    return Err(eyre!("Failed to load data: {}", error));
  }
  print_json(&controller.data().cloned().unwrap_or(Value::Null))
}

async fn walk_pages(
  repository: UrlDataRepository<CursorPage<Value>, Box<dyn HttpClient>, MemoryHistory>,
  sync_config: SyncConfig,
  fragment: QueryMap,
  pages: usize,
) -> Result<()> {
  let mut sync = CursorPaginatedSync::new(Arc::new(repository), sync_config);
  sync.start().await?;
  if !fragment.is_empty() && !sync.update_query([fragment]).await? {
    sync.get_data();
  }

  for remaining in (0..pages.max(1)).rev() {
    sync.settle().await;
    if let Some(error) = sync.error() {
      return Err(eyre!("Failed to load page {}: {}", sync.page(), error));
    }

    print_json(&json!({
      "page": sync.page(),
      "query": sync.url_query().to_string(),
      "results": sync.results(),
      "hasNext": sync.has_next(),
    }))?;

    if remaining == 0 || !sync.go_to_next_page().await? {
      break;
    }
  }

  sync.stop();
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override base URL if specified on command line
  let config = if let Some(base_url) = args.base_url {
    Config {
      base_url: Some(base_url),
      ..config
    }
  } else {
    config
  };

  let _guard = init_tracing(config.log_file.as_deref())?;

  let fragment: QueryMap = args.set.into_iter().collect();
  let mut sync_config = config.sync_config();
  if !fragment.is_empty() {
    // The query write below issues the load
    sync_config.fetch_on_start = false;
  }

  let history = MemoryHistory::new(&args.location);
  info!(location = %args.location, paginated = args.paginated, "loading");

  if args.paginated {
    let repository = UrlDataRepository::new(build_client(&config)?, history);
    walk_pages(repository, sync_config, fragment, args.pages).await
  } else {
    let repository = UrlDataRepository::new(build_client(&config)?, history);
    load_once(repository, sync_config, fragment).await
  }
}
