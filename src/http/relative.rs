//! Client that treats the API as living under the same origin as the app.

use color_eyre::Result;
use futures::future::BoxFuture;
use serde_json::Value;

use super::client::{HttpClient, RequestConfig};

/// Routes every request to `{origin}{prefix}{url}`.
///
/// With origin `https://example.com` and prefix `/api`, a request for
/// `/users/1` goes to `https://example.com/api/users/1`.
pub struct RelativeHttpClient<C> {
  origin: String,
  prefix: String,
  inner: C,
}

impl<C: HttpClient> RelativeHttpClient<C> {
  pub fn new(origin: impl Into<String>, inner: C) -> Self {
    Self::with_prefix(origin, "/api", inner)
  }

  pub fn with_prefix(origin: impl Into<String>, prefix: impl Into<String>, inner: C) -> Self {
    Self {
      origin: origin.into().trim_end_matches('/').to_string(),
      prefix: prefix.into(),
      inner,
    }
  }

  fn full_url(&self, url: &str) -> String {
    format!("{}{}{}", self.origin, self.prefix, url)
  }
}

impl<C: HttpClient> HttpClient for RelativeHttpClient<C> {
  fn fetch(&self, config: RequestConfig) -> BoxFuture<'_, Result<Value>> {
    let url = self.full_url(config.url.as_deref().unwrap_or(""));
    self.inner.fetch(RequestConfig {
      base_url: None,
      url: Some(url),
      ..config
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::Method;
  use crate::testing::FakeHttpClient;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_prefixes_origin_and_api() {
    let fake = Arc::new(FakeHttpClient::default());
    let client = RelativeHttpClient::new("https://example.com/", Arc::clone(&fake));

    for method in [Method::Get, Method::Post, Method::Patch, Method::Delete, Method::Head] {
      fake.respond(Value::Null);
      client
        .fetch(RequestConfig {
          method: Some(method),
          url: Some("/users/1".to_string()),
          ..Default::default()
        })
        .await
        .unwrap();
    }

    let requests = fake.requests();
    assert_eq!(requests.len(), 5);
    for request in requests {
      assert_eq!(request.url.as_deref(), Some("https://example.com/api/users/1"));
      assert_eq!(request.base_url, None);
    }
  }

  #[tokio::test]
  async fn test_custom_prefix() {
    let fake = Arc::new(FakeHttpClient::default());
    let client = RelativeHttpClient::with_prefix("http://localhost:8000", "", Arc::clone(&fake));

    fake.respond(Value::Null);
    client.fetch(RequestConfig::default()).await.unwrap();

    assert_eq!(
      fake.requests()[0].url.as_deref(),
      Some("http://localhost:8000")
    );
  }
}
