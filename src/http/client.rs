use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::query::{decode, encode, QueryMap};

/// HTTP verb
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
  #[default]
  Get,
  Post,
  Put,
  Patch,
  Delete,
  Head,
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
      Method::Head => reqwest::Method::HEAD,
    }
  }
}

/// Description of a single request.
///
/// Every field is optional so configs can be layered with
/// [`RequestConfig::merged`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
  pub method: Option<Method>,
  pub base_url: Option<String>,
  pub url: Option<String>,
  pub params: QueryMap,
  pub data: Option<Value>,
  pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
  /// Layer `overrides` on top of `defaults`.
  ///
  /// Scalar fields set in `overrides` win. Headers and params merge key by
  /// key with the override taking precedence.
  pub fn merged(defaults: RequestConfig, overrides: RequestConfig) -> RequestConfig {
    let mut headers = defaults.headers;
    headers.extend(overrides.headers);

    RequestConfig {
      method: overrides.method.or(defaults.method),
      base_url: overrides.base_url.or(defaults.base_url),
      url: overrides.url.or(defaults.url),
      params: defaults.params.applied(&overrides.params),
      data: overrides.data.or(defaults.data),
      headers,
    }
  }

  pub fn method(&self) -> Method {
    self.method.unwrap_or_default()
  }
}

/// Anything that can execute a [`RequestConfig`] and return the JSON body.
pub trait HttpClient: Send + Sync {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>> {
    (**self).fetch(config)
  }
}

impl<C: HttpClient + ?Sized> HttpClient for Box<C> {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>> {
    (**self).fetch(config)
  }
}

/// HTTP client backed by reqwest
#[derive(Clone)]
pub struct ReqwestClient {
  http: reqwest::Client,
  base_url: Option<String>,
  headers: BTreeMap<String, String>,
}

impl ReqwestClient {
  pub fn new(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      headers: BTreeMap::new(),
    })
  }

  /// Build a client from configuration, adding a bearer token when one is
  /// present in the environment.
  pub fn from_config(config: &Config) -> Result<Self> {
    let mut client = Self::new(
      config.base_url.clone(),
      config.timeout_secs.map(Duration::from_secs),
    )?;

    client.headers.extend(config.headers.clone());
    if let Some(token) = Config::get_token() {
      client
        .headers
        .insert("Authorization".to_string(), format!("Bearer {}", token));
    }

    Ok(client)
  }

  /// Resolve the full URL of a request, params included.
  pub fn request_url(&self, config: &RequestConfig) -> Result<url::Url> {
    let path = config.url.as_deref().unwrap_or("");
    let raw = match config.base_url.as_deref().or(self.base_url.as_deref()) {
      Some(base) if !path.starts_with("http://") && !path.starts_with("https://") => {
        join_url(base, path)
      }
      _ => path.to_string(),
    };

    let mut url = url::Url::parse(&raw).map_err(|e| eyre!("Invalid request URL {}: {}", raw, e))?;

    let existing = url.query().map(decode).unwrap_or_default();
    let params = existing.applied(&config.params);
    let search = encode(&params);
    url.set_query(search.strip_prefix('?').filter(|q| !q.is_empty()));

    Ok(url)
  }

  async fn execute(&self, config: RequestConfig) -> Result<Value> {
    let url = self.request_url(&config)?;
    let method = config.method();
    debug!(?method, %url, "sending request");

    let mut headers = self.headers.clone();
    headers.extend(config.headers.clone());

    let mut request = self.http.request(method.into(), url.clone());
    for (name, value) in &headers {
      request = request.header(name.as_str(), value.as_str());
    }
    if let Some(data) = &config.data {
      request = request.json(data);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?;

    if !status.is_success() {
      return Err(eyre!(
        "Unexpected status {} from {}: {}",
        status,
        url,
        String::from_utf8_lossy(&body)
      ));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&body).map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
  }
}

impl HttpClient for ReqwestClient {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>> {
    self.execute(config).boxed()
  }
}

fn join_url(base: &str, path: &str) -> String {
  if path.is_empty() {
    return base.to_string();
  }
  format!(
    "{}/{}",
    base.trim_end_matches('/'),
    path.trim_start_matches('/')
  )
}
