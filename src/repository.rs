//! Remote data port and its HTTP implementation.
//!
//! The repository treats the current location as the address of the data:
//! a view at `/users/1?expand=roles` loads `GET /users/1?expand=roles` and
//! saves with `PATCH` to the same place.

use color_eyre::{eyre::eyre, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tracing::debug;

use crate::history::{Navigator, Subscription, UrlListener};
use crate::http::{HttpClient, Method, RequestConfig};
use crate::query::{url_components, QueryMap};

/// Everything the sync controller needs from the outside world.
pub trait RemoteDataPort<T>: Send + Sync + 'static {
  /// Load data for the current URL. `additional` is layered over the URL
  /// query, key by key.
  fn get(&self, additional: QueryMap, overrides: RequestConfig) -> BoxFuture<'_, Result<T>>;

  /// Save `data` and return the server's version of it.
  fn update(&self, data: T, overrides: RequestConfig) -> BoxFuture<'_, Result<T>>;

  fn url_query(&self) -> BoxFuture<'_, Result<QueryMap>>;

  /// Rewrite the current URL's query without adding a history entry.
  fn replace_url_query(&self, query: QueryMap) -> BoxFuture<'_, Result<()>>;

  fn on_url_state_change(&self, listener: UrlListener) -> Subscription;
}

/// [`RemoteDataPort`] over an HTTP client and a navigator.
pub struct UrlDataRepository<T, C, N> {
  client: C,
  navigator: N,
  _data: PhantomData<fn() -> T>,
}

impl<T, C, N> UrlDataRepository<T, C, N>
where
  C: HttpClient,
  N: Navigator,
{
  pub fn new(client: C, navigator: N) -> Self {
    Self {
      client,
      navigator,
      _data: PhantomData,
    }
  }

  pub fn navigator(&self) -> &N {
    &self.navigator
  }

  /// Request config addressed at the current location.
  fn location_config(&self, method: Method, additional: &QueryMap) -> RequestConfig {
    let components = url_components(&self.navigator.location());
    RequestConfig {
      method: Some(method),
      url: Some(components.pathname),
      params: components.query.applied(additional),
      ..Default::default()
    }
  }
}

impl<T, C, N> RemoteDataPort<T> for UrlDataRepository<T, C, N>
where
  T: Serialize + DeserializeOwned + Send + 'static,
  C: HttpClient + 'static,
  N: Navigator + 'static,
{
  fn get(&self, additional: QueryMap, overrides: RequestConfig) -> BoxFuture<'_, Result<T>> {
    let config = RequestConfig::merged(self.location_config(Method::Get, &additional), overrides);

    async move {
      let url = config.url.clone().unwrap_or_default();
      debug!(%url, params = %config.params, "loading data");
      let value = self.client.fetch(config).await?;
      serde_json::from_value(value).map_err(|e| eyre!("Failed to decode data from {}: {}", url, e))
    }
    .boxed()
  }

  fn update(&self, data: T, overrides: RequestConfig) -> BoxFuture<'_, Result<T>> {
    let defaults = self.location_config(Method::Patch, &QueryMap::new());

    async move {
      let body = serde_json::to_value(&data).map_err(|e| eyre!("Failed to encode data: {}", e))?;
      let config = RequestConfig::merged(
        RequestConfig {
          data: Some(body),
          ..defaults
        },
        overrides,
      );

      let url = config.url.clone().unwrap_or_default();
      debug!(%url, "saving data");
      let value = self.client.fetch(config).await?;
      serde_json::from_value(value).map_err(|e| eyre!("Failed to decode saved data from {}: {}", url, e))
    }
    .boxed()
  }

  fn url_query(&self) -> BoxFuture<'_, Result<QueryMap>> {
    let query = url_components(&self.navigator.location()).query;
    future::ready(Ok(query)).boxed()
  }

  fn replace_url_query(&self, query: QueryMap) -> BoxFuture<'_, Result<()>> {
    let location = self.navigator.location().with_query(&query);
    self.navigator.replace(&location.href());
    future::ready(Ok(())).boxed()
  }

  fn on_url_state_change(&self, listener: UrlListener) -> Subscription {
    self.navigator.listen(listener)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::history::MemoryHistory;
  use crate::testing::FakeHttpClient;
  use serde::Deserialize;
  use serde_json::json;
  use std::sync::Arc;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Data {
    a: i32,
    b: i32,
    c: i32,
  }

  fn repository(
    location: &str,
  ) -> (
    Arc<FakeHttpClient>,
    UrlDataRepository<Data, Arc<FakeHttpClient>, MemoryHistory>,
  ) {
    let fake = Arc::new(FakeHttpClient::default());
    let repo = UrlDataRepository::new(Arc::clone(&fake), MemoryHistory::new(location));
    (fake, repo)
  }

  #[tokio::test]
  async fn test_get_uses_location() {
    let (fake, repo) = repository("/users/1?a=1&b=2");
    fake.respond(json!({ "a": 0, "b": 1, "c": 2 }));

    let result = repo
      .get(QueryMap::new(), RequestConfig::default())
      .await
      .unwrap();
    assert_eq!(result, Data { a: 0, b: 1, c: 2 });

    let request = &fake.requests()[0];
    assert_eq!(request.method(), Method::Get);
    assert_eq!(request.url.as_deref(), Some("/users/1"));
    assert_eq!(request.params, QueryMap::new().with("a", "1").with("b", "2"));
  }

  #[tokio::test]
  async fn test_get_layers_additional_query_and_overrides() {
    let (fake, repo) = repository("/users?a=1&b=2");
    fake.respond(json!({ "a": 0, "b": 0, "c": 0 }));

    let overrides = RequestConfig {
      url: Some("/people".to_string()),
      params: QueryMap::new().with("c", "3"),
      ..Default::default()
    };
    repo
      .get(QueryMap::new().with("b", "9"), overrides)
      .await
      .unwrap();

    let request = &fake.requests()[0];
    assert_eq!(request.url.as_deref(), Some("/people"));
    assert_eq!(
      request.params,
      QueryMap::new().with("a", "1").with("b", "9").with("c", "3")
    );
  }

  #[tokio::test]
  async fn test_update_patches_with_body() {
    let (fake, repo) = repository("/users/1?a=1");
    let data = Data { a: 0, b: 1, c: 2 };
    fake.respond(json!({ "a": 5, "b": 1, "c": 2 }));

    let result = repo
      .update(data.clone(), RequestConfig::default())
      .await
      .unwrap();
    assert_eq!(result.a, 5);

    let request = &fake.requests()[0];
    assert_eq!(request.method(), Method::Patch);
    assert_eq!(request.url.as_deref(), Some("/users/1"));
    assert_eq!(request.data, Some(serde_json::to_value(&data).unwrap()));
    assert_eq!(request.params, QueryMap::new().with("a", "1"));
  }

  #[tokio::test]
  async fn test_decode_failure_is_an_error() {
    let (fake, repo) = repository("/users/1");
    fake.respond(json!({ "unexpected": true }));

    let result = repo.get(QueryMap::new(), RequestConfig::default()).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_replace_url_query_rewrites_current_entry() {
    let (_fake, repo) = repository("/users?a=1");
    repo
      .replace_url_query(QueryMap::new().with("a", "2").without("b"))
      .await
      .unwrap();

    assert_eq!(repo.navigator().location().href(), "/users?a=2");
    assert_eq!(repo.navigator().len(), 1);
    assert_eq!(
      repo.url_query().await.unwrap(),
      QueryMap::new().with("a", "2")
    );

    repo.replace_url_query(QueryMap::new()).await.unwrap();
    assert_eq!(repo.navigator().location().href(), "/users");
  }

  #[tokio::test]
  async fn test_hash_routed_location() {
    let (fake, repo) = repository("/#/users/1?page=2");
    fake.respond(json!({ "a": 0, "b": 0, "c": 0 }));

    repo
      .get(QueryMap::new(), RequestConfig::default())
      .await
      .unwrap();

    let request = &fake.requests()[0];
    assert_eq!(request.url.as_deref(), Some("/users/1"));
    assert_eq!(request.params, QueryMap::new().with("page", "2"));
  }
}
