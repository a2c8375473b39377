use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::sync::SyncConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Base URL requests are resolved against (e.g. "https://api.example.com")
  pub base_url: Option<String>,
  /// When set, requests go to `{origin}{api_prefix}{path}` instead of
  /// `{base_url}{path}`
  pub origin: Option<String>,
  #[serde(default = "default_api_prefix")]
  pub api_prefix: String,
  /// Headers sent with every request
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  pub timeout_secs: Option<u64>,
  /// Query keys whose change triggers a refetch. Omit to observe all keys.
  pub observed_query_keys: Option<Vec<String>>,
  #[serde(default = "default_true")]
  pub fetch_on_start: bool,
  /// Write logs to this file instead of stderr
  pub log_file: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url: None,
      origin: None,
      api_prefix: default_api_prefix(),
      headers: BTreeMap::new(),
      timeout_secs: None,
      observed_query_keys: None,
      fetch_on_start: true,
      log_file: None,
    }
  }
}

fn default_api_prefix() -> String {
  "/api".to_string()
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./urlsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/urlsync/config.yaml
  ///
  /// Without any file the defaults are used.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("urlsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("urlsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the API token from the environment, if any.
  ///
  /// Checks URLSYNC_TOKEN.
  pub fn get_token() -> Option<String> {
    std::env::var("URLSYNC_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }

  /// Controller settings derived from this configuration.
  pub fn sync_config(&self) -> SyncConfig {
    SyncConfig {
      observed_query_keys: self.observed_query_keys.clone(),
      fetch_on_start: self.fetch_on_start,
      ..SyncConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full() {
    let config = Config::parse(
      r#"
base_url: https://api.example.com
headers:
  Accept: application/json
timeout_secs: 10
observed_query_keys: [page, sort]
fetch_on_start: false
"#,
    )
    .unwrap();

    assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
    assert_eq!(config.headers.get("Accept").map(String::as_str), Some("application/json"));
    assert_eq!(config.timeout_secs, Some(10));
    assert_eq!(config.api_prefix, "/api");

    let sync = config.sync_config();
    assert_eq!(
      sync.observed_query_keys,
      Some(vec!["page".to_string(), "sort".to_string()])
    );
    assert!(!sync.fetch_on_start);
  }

  #[test]
  fn test_parse_empty_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert!(config.fetch_on_start);
    assert!(config.observed_query_keys.is_none());

    let config = Config::parse("origin: http://localhost:8000\n").unwrap();
    assert!(config.fetch_on_start);
    assert_eq!(config.origin.as_deref(), Some("http://localhost:8000"));
  }

  #[test]
  fn test_observe_nothing_is_distinct_from_unset() {
    let config = Config::parse("observed_query_keys: []\n").unwrap();
    assert_eq!(config.sync_config().observed_query_keys, Some(Vec::new()));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/urlsync.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_rejects_wrong_types() {
    assert!(Config::parse("timeout_secs: soon\n").is_err());
  }
}
