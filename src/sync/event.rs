use crate::history::UrlChange;

/// Completion or notification delivered to a sync controller
#[derive(Debug)]
pub enum SyncEvent<T> {
  /// A `get` call finished
  Loaded(Result<T, String>),
  /// An `update` call finished
  Saved(Result<T, String>),
  /// The URL changed
  UrlChanged(UrlChange),
}
