//! Cursor pagination on top of [`SyncController`].
//!
//! The server answers list requests with opaque `next`/`previous` tokens.
//! Navigation writes one of them into the URL query, which refetches through
//! the normal query-change path. The page number is never sent anywhere; it
//! is inferred from how the new token pair relates to the previous one.

use color_eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::controller::{SyncConfig, SyncController};
use super::slot::DataSlot;
use super::sparse::materialize_page;
use crate::query::QueryMap;
use crate::repository::RemoteDataPort;

/// Query key carrying the forward cursor
pub const NEXT_KEY: &str = "next";
/// Query key carrying the backward cursor
pub const PREVIOUS_KEY: &str = "previous";

/// One page of a cursor-paginated response.
///
/// Deserializes from `null` or from an object missing any field; absent
/// results become an empty list and absent metadata stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
  pub results: Vec<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort_field: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub previous: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub has_next: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub has_previous: Option<bool>,
}

impl<T> Default for CursorPage<T> {
  fn default() -> Self {
    Self {
      results: Vec::new(),
      limit: None,
      order: None,
      sort_field: None,
      next: None,
      previous: None,
      has_next: None,
      has_previous: None,
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCursorPage<T> {
  results: Option<Vec<T>>,
  limit: Option<u64>,
  order: Option<String>,
  sort_field: Option<String>,
  next: Option<String>,
  previous: Option<String>,
  has_next: Option<bool>,
  has_previous: Option<bool>,
}

impl<T> From<RawCursorPage<T>> for CursorPage<T> {
  fn from(raw: RawCursorPage<T>) -> Self {
    Self {
      results: raw.results.unwrap_or_default(),
      limit: raw.limit,
      order: raw.order,
      sort_field: raw.sort_field,
      next: raw.next,
      previous: raw.previous,
      has_next: raw.has_next,
      has_previous: raw.has_previous,
    }
  }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CursorPage<T> {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = Option::<RawCursorPage<T>>::deserialize(deserializer)?;
    Ok(raw.map(CursorPage::from).unwrap_or_default())
  }
}

/// How a new token pair relates to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Backward,
  Unchanged,
}

/// Current cursor tokens and the inferred page number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorState {
  next: Option<String>,
  previous: Option<String>,
  page: usize,
}

impl CursorState {
  pub fn next(&self) -> Option<&str> {
    self.next.as_deref()
  }

  pub fn previous(&self) -> Option<&str> {
    self.previous.as_deref()
  }

  /// Zero-based page index.
  pub fn page(&self) -> usize {
    self.page
  }

  /// Record a new token pair and adjust the page.
  ///
  /// The new `next` matching the old `previous` means we went back; the new
  /// `previous` matching the old `next` means we went forward. Absent tokens
  /// never match.
  pub fn observe(&mut self, next: Option<&str>, previous: Option<&str>) -> Direction {
    let direction = if same_token(next, self.previous.as_deref()) {
      Direction::Backward
    } else if same_token(previous, self.next.as_deref()) {
      Direction::Forward
    } else {
      Direction::Unchanged
    };

    match direction {
      Direction::Backward => self.page = self.page.saturating_sub(1),
      Direction::Forward => self.page += 1,
      Direction::Unchanged => {}
    }

    self.next = next.map(String::from);
    self.previous = previous.map(String::from);
    direction
  }
}

fn same_token(a: Option<&str>, b: Option<&str>) -> bool {
  matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Sync controller for cursor-paginated lists.
pub struct CursorPaginatedSync<T, P> {
  inner: SyncController<CursorPage<T>, P>,
  cursor: CursorState,
}

impl<T, P> CursorPaginatedSync<T, P>
where
  T: Clone + Send + 'static,
  P: RemoteDataPort<CursorPage<T>>,
{
  pub fn new(port: Arc<P>, config: SyncConfig) -> Self {
    Self::from_controller(SyncController::new(port, config))
  }

  pub fn from_controller(inner: SyncController<CursorPage<T>, P>) -> Self {
    Self {
      inner,
      cursor: CursorState::default(),
    }
  }

  pub async fn start(&mut self) -> Result<()> {
    self.inner.start().await
  }

  pub fn stop(&mut self) {
    self.inner.stop();
  }

  pub fn get_data(&mut self) {
    self.inner.get_data();
  }

  pub async fn update_query<I>(&mut self, fragments: I) -> Result<bool>
  where
    I: IntoIterator<Item = QueryMap>,
  {
    self.inner.update_query(fragments).await
  }

  /// Navigate to the page after this one. Does nothing without a `next`
  /// token; returns whether a load was issued.
  ///
  /// Loads whenever the token changes the URL, even if `next` is not among
  /// the observed query keys.
  pub async fn go_to_next_page(&mut self) -> Result<bool> {
    let Some(next) = self.cursor.next.clone() else {
      debug!("no next page");
      return Ok(false);
    };
    self
      .navigate(QueryMap::new().with(NEXT_KEY, next).without(PREVIOUS_KEY))
      .await
  }

  /// Navigate to the page before this one. Does nothing without a
  /// `previous` token; returns whether a load was issued.
  ///
  /// Like [`CursorPaginatedSync::go_to_next_page`], this ignores the observed
  /// query keys.
  pub async fn go_to_previous_page(&mut self) -> Result<bool> {
    let Some(previous) = self.cursor.previous.clone() else {
      debug!("no previous page");
      return Ok(false);
    };
    self
      .navigate(QueryMap::new().without(NEXT_KEY).with(PREVIOUS_KEY, previous))
      .await
  }

  async fn navigate(&mut self, fragment: QueryMap) -> Result<bool> {
    let before = self.inner.url_query().clone();
    if self.inner.append_query(fragment).await? {
      return Ok(true);
    }
    if self.inner.url_query() == &before {
      return Ok(false);
    }
    self.inner.get_data();
    Ok(true)
  }

  pub fn poll(&mut self) -> bool {
    let cursor = &mut self.cursor;
    self.inner.poll_with(|page| track(cursor, page))
  }

  pub async fn settle(&mut self) {
    let cursor = &mut self.cursor;
    self.inner.settle_with(|page| track(cursor, page)).await
  }

  pub fn cursor(&self) -> &CursorState {
    &self.cursor
  }

  pub fn page(&self) -> usize {
    self.cursor.page
  }

  /// Results of the current page, empty before the first load.
  pub fn results(&self) -> &[T] {
    self
      .inner
      .data()
      .map(|page| page.results.as_slice())
      .unwrap_or(&[])
  }

  /// Current page placed inside a list of `total` slots.
  ///
  /// The page size is the server's `limit`, or the result count when the
  /// server did not send one.
  pub fn sparse_results(&self, total: usize) -> Vec<Option<T>> {
    let page_size = self
      .inner
      .data()
      .and_then(|page| page.limit)
      .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
      .unwrap_or_else(|| self.results().len());
    materialize_page(total, page_size, self.cursor.page, self.results().to_vec())
  }

  pub fn has_next(&self) -> Option<bool> {
    self.inner.data().and_then(|page| page.has_next)
  }

  pub fn has_previous(&self) -> Option<bool> {
    self.inner.data().and_then(|page| page.has_previous)
  }

  pub fn limit(&self) -> Option<u64> {
    self.inner.data().and_then(|page| page.limit)
  }

  pub fn order(&self) -> Option<&str> {
    self.inner.data().and_then(|page| page.order.as_deref())
  }

  pub fn sort_field(&self) -> Option<&str> {
    self.inner.data().and_then(|page| page.sort_field.as_deref())
  }

  pub fn error(&self) -> Option<&str> {
    self.inner.error()
  }

  pub fn is_loading(&self) -> bool {
    self.inner.is_loading()
  }

  pub fn url_query(&self) -> &QueryMap {
    self.inner.url_query()
  }

  pub fn slot(&self) -> &DataSlot<CursorPage<T>> {
    self.inner.slot()
  }

  pub fn controller(&self) -> &SyncController<CursorPage<T>, P> {
    &self.inner
  }
}

fn track<T>(cursor: &mut CursorState, page: &CursorPage<T>) {
  let direction = cursor.observe(page.next.as_deref(), page.previous.as_deref());
  debug!(?direction, page = cursor.page, "cursor updated");
}
