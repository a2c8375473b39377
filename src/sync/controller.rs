//! Controller that keeps a single data slot in sync with the URL query.
//!
//! Remote calls run on spawned tasks and report back through a channel, so
//! the slot has exactly one writer: whoever drives [`SyncController::poll`]
//! (or awaits [`SyncController::settle`]).
//!
//! # Example
//!
//! ```ignore
//! let repository = UrlDataRepository::new(client, history.clone());
//! let mut users = SyncController::new(Arc::new(repository), SyncConfig::default());
//!
//! users.start().await?;
//! users.settle().await;
//!
//! // Optimistic edit, then save
//! users.update_data(&json!({ "name": "Ada" }))?;
//! users.save_data();
//!
//! // In an event loop tick
//! if users.poll() {
//!     render(users.slot());
//! }
//! ```

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::event::SyncEvent;
use super::slot::DataSlot;
use crate::history::{NavigationAction, Subscription, UrlChange};
use crate::http::RequestConfig;
use crate::json::shallow_merge;
use crate::query::{should_refetch, url_query, QueryMap};
use crate::repository::RemoteDataPort;

/// Per-instance settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
  /// Query keys whose change triggers a refetch. `None` observes every key,
  /// an empty list observes none.
  pub observed_query_keys: Option<Vec<String>>,
  /// Layered over every request the controller makes
  pub overrides: RequestConfig,
  /// Issue a load as part of `start()`
  pub fetch_on_start: bool,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      observed_query_keys: None,
      overrides: RequestConfig::default(),
      fetch_on_start: true,
    }
  }
}

type DataChangeFn<T> = Box<dyn FnMut(&T) + Send>;

pub struct SyncController<T, P> {
  port: Arc<P>,
  config: SyncConfig,
  slot: DataSlot<T>,
  url_query: QueryMap,
  event_tx: mpsc::UnboundedSender<SyncEvent<T>>,
  event_rx: mpsc::UnboundedReceiver<SyncEvent<T>>,
  subscription: Option<Subscription>,
  on_data_change: Option<DataChangeFn<T>>,
}

impl<T, P> SyncController<T, P>
where
  T: Clone + Send + 'static,
  P: RemoteDataPort<T>,
{
  pub fn new(port: Arc<P>, config: SyncConfig) -> Self {
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    Self {
      port,
      config,
      slot: DataSlot::default(),
      url_query: QueryMap::new(),
      event_tx,
      event_rx,
      subscription: None,
      on_data_change: None,
    }
  }

  /// Seed the slot before the first load completes.
  pub fn with_initial_data(mut self, data: T) -> Self {
    self.slot = DataSlot::new(Some(data));
    self
  }

  /// Called with every value the server returns, before it is stored.
  pub fn on_data_change(mut self, callback: impl FnMut(&T) + Send + 'static) -> Self {
    self.on_data_change = Some(Box::new(callback));
    self
  }

  pub fn slot(&self) -> &DataSlot<T> {
    &self.slot
  }

  pub fn data(&self) -> Option<&T> {
    self.slot.data()
  }

  pub fn error(&self) -> Option<&str> {
    self.slot.error()
  }

  pub fn is_loading(&self) -> bool {
    self.slot.is_loading()
  }

  /// Query as last observed by this controller.
  pub fn url_query(&self) -> &QueryMap {
    &self.url_query
  }

  pub fn config(&self) -> &SyncConfig {
    &self.config
  }

  pub fn is_started(&self) -> bool {
    self.subscription.is_some()
  }

  /// Read the URL query, subscribe to URL changes and optionally load.
  ///
  /// Calling `start` on a running controller does nothing.
  pub async fn start(&mut self) -> Result<()> {
    if self.is_started() {
      return Ok(());
    }

    self.url_query = self.port.url_query().await?;

    let tx = self.event_tx.clone();
    let subscription = self.port.on_url_state_change(Box::new(move |change: &UrlChange| {
      // Receiver lives as long as the controller
      let _ = tx.send(SyncEvent::UrlChanged(change.clone()));
    }));
    self.subscription = Some(subscription);
    debug!(query = %self.url_query, "sync controller started");

    if self.config.fetch_on_start {
      self.get_data();
    }
    Ok(())
  }

  /// Release the URL subscription. URL changes already queued are dropped,
  /// including across a later `start`; pending completions are kept.
  pub fn stop(&mut self) {
    let Some(subscription) = self.subscription.take() else {
      return;
    };
    subscription.unsubscribe();

    let mut kept = Vec::new();
    let mut dropped = 0usize;
    while let Ok(event) = self.event_rx.try_recv() {
      match event {
        SyncEvent::UrlChanged(_) => dropped += 1,
        completion => kept.push(completion),
      }
    }
    for completion in kept {
      // Receiver lives as long as the controller
      let _ = self.event_tx.send(completion);
    }
    debug!(dropped, "sync controller stopped");
  }

  /// Load data for the current URL.
  pub fn get_data(&mut self) {
    self.get_data_with(QueryMap::new());
  }

  /// Load data with `extra` layered over the URL query.
  ///
  /// Overlapping calls are not coalesced; whichever completes last wins.
  pub fn get_data_with(&mut self, extra: QueryMap) {
    self.slot.begin();

    let port = Arc::clone(&self.port);
    let overrides = self.config.overrides.clone();
    let tx = self.event_tx.clone();
    debug!(query = %self.url_query, extra = %extra, "loading data");

    tokio::spawn(async move {
      let result = port.get(extra, overrides).await.map_err(|e| e.to_string());
      let _ = tx.send(SyncEvent::Loaded(result));
    });
  }

  /// Send the current data to the server. On success the server's copy
  /// replaces it; on failure the local copy is kept.
  ///
  /// Returns false, without calling the server, when there is no data.
  pub fn save_data(&mut self) -> bool {
    let Some(data) = self.slot.data().cloned() else {
      warn!("save requested with no data loaded");
      return false;
    };
    self.slot.begin();

    let port = Arc::clone(&self.port);
    let overrides = self.config.overrides.clone();
    let tx = self.event_tx.clone();
    debug!("saving data");

    tokio::spawn(async move {
      let result = port.update(data, overrides).await.map_err(|e| e.to_string());
      let _ = tx.send(SyncEvent::Saved(result));
    });
    true
  }

  /// Merge `fragments` into the URL query and refetch if the change is
  /// observed.
  ///
  /// Fragments are combined with each other by concatenating values, then
  /// written over the current query key by key (an empty list removes the
  /// key). Returns whether a refetch was issued.
  pub async fn update_query<I>(&mut self, fragments: I) -> Result<bool>
  where
    I: IntoIterator<Item = QueryMap>,
  {
    let fragment = QueryMap::merge_all(fragments);
    let next = self.port.url_query().await?.applied(&fragment);

    self.port.replace_url_query(next.clone()).await?;

    let refetch = should_refetch(
      &self.url_query,
      &next,
      self.config.observed_query_keys.as_deref(),
    );
    self.url_query = next;

    if refetch {
      self.get_data();
    }
    Ok(refetch)
  }

  pub async fn append_query(&mut self, fragment: QueryMap) -> Result<bool> {
    self.update_query([fragment]).await
  }

  /// Apply pending completions and URL changes without waiting.
  ///
  /// Returns true if anything was applied.
  pub fn poll(&mut self) -> bool {
    self.poll_with(|_| {})
  }

  /// [`SyncController::poll`], calling `observe` with each value received
  /// from the server.
  pub fn poll_with<F: FnMut(&T)>(&mut self, mut observe: F) -> bool {
    let mut changed = false;
    while let Ok(event) = self.event_rx.try_recv() {
      self.apply(event, &mut observe);
      changed = true;
    }
    changed
  }

  /// Wait for one completion or URL change and apply it.
  pub async fn next_change(&mut self) -> bool {
    match self.event_rx.recv().await {
      Some(event) => {
        self.apply(event, &mut |_: &T| {});
        true
      }
      None => false,
    }
  }

  /// Wait until no call is outstanding, applying events as they arrive.
  pub async fn settle(&mut self) {
    self.settle_with(|_| {}).await
  }

  pub async fn settle_with<F: FnMut(&T)>(&mut self, mut observe: F) {
    loop {
      self.poll_with(&mut observe);
      if !self.slot.is_loading() {
        return;
      }
      match self.event_rx.recv().await {
        Some(event) => self.apply(event, &mut observe),
        None => return,
      }
    }
  }

  fn apply<F: FnMut(&T)>(&mut self, event: SyncEvent<T>, observe: &mut F) {
    match event {
      SyncEvent::Loaded(Ok(data)) | SyncEvent::Saved(Ok(data)) => {
        if let Some(callback) = self.on_data_change.as_mut() {
          callback(&data);
        }
        observe(&data);
        self.slot.succeed(data);
      }
      SyncEvent::Loaded(Err(error)) | SyncEvent::Saved(Err(error)) => {
        warn!(%error, "remote call failed");
        self.slot.fail(error);
      }
      SyncEvent::UrlChanged(change) => self.handle_url_change(change),
    }
  }

  fn handle_url_change(&mut self, change: UrlChange) {
    if !self.is_started() {
      debug!("dropping URL change received after stop");
      return;
    }
    // Only in-place rewrites are tracked; push and pop are navigation away
    if change.action != NavigationAction::Replace {
      return;
    }

    let query = url_query(&change.location);
    let refetch = should_refetch(
      &self.url_query,
      &query,
      self.config.observed_query_keys.as_deref(),
    );
    self.url_query = query;

    if refetch {
      debug!(query = %self.url_query, "observed query changed");
      self.get_data();
    }
  }
}

impl<T, P> SyncController<T, P>
where
  T: Clone + Send + Serialize + DeserializeOwned + 'static,
  P: RemoteDataPort<T>,
{
  /// Optimistic local edit: shallow-merge `partial` into the data without
  /// calling the server.
  pub fn update_data<U: Serialize + ?Sized>(&mut self, partial: &U) -> Result<()> {
    let data = shallow_merge(self.slot.data(), partial)?;
    self.slot.set_data(data);
    Ok(())
  }
}

impl<T, P> std::fmt::Debug for SyncController<T, P>
where
  T: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SyncController")
      .field("slot", &self.slot)
      .field("url_query", &self.url_query)
      .field("started", &self.subscription.is_some())
      .finish_non_exhaustive()
  }
}
