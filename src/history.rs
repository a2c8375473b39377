//! Navigation port and an in-memory history implementation.
//!
//! Listeners are registered explicitly through [`Navigator::listen`] and
//! released through the returned [`Subscription`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

use crate::query::Location;

/// Kind of history transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAction {
  /// New entry added on top of the stack
  Push,
  /// Current entry rewritten in place
  Replace,
  /// Moved back to an earlier entry
  Pop,
}

/// Notification sent to listeners after the location changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlChange {
  pub action: NavigationAction,
  pub location: Location,
}

/// Callback invoked on every URL change
pub type UrlListener = Box<dyn Fn(&UrlChange) + Send + Sync>;

/// Handle returned by listener registration.
///
/// `unsubscribe` may be called any number of times; only the first call has
/// an effect. Dropping the handle unsubscribes as well.
pub struct Subscription {
  cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      cancel: Mutex::new(Some(Box::new(cancel))),
    }
  }

  pub fn unsubscribe(&self) {
    let cancel = self
      .cancel
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(cancel) = cancel {
      cancel();
    }
  }

  pub fn is_active(&self) -> bool {
    self
      .cancel
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.unsubscribe();
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.is_active())
      .finish()
  }
}

/// Access to the current location and its change notifications.
pub trait Navigator: Send + Sync {
  fn location(&self) -> Location;

  /// Add a new entry. `path` may be a full path or a bare `?query`/`#hash`.
  fn push(&self, path: &str);

  /// Rewrite the current entry without adding history.
  fn replace(&self, path: &str);

  fn listen(&self, listener: UrlListener) -> Subscription;
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
  fn location(&self) -> Location {
    (**self).location()
  }

  fn push(&self, path: &str) {
    (**self).push(path)
  }

  fn replace(&self, path: &str) {
    (**self).replace(path)
  }

  fn listen(&self, listener: UrlListener) -> Subscription {
    (**self).listen(listener)
  }
}

struct Entries {
  stack: Vec<Location>,
  index: usize,
}

struct HistoryInner {
  entries: Mutex<Entries>,
  listeners: Mutex<BTreeMap<u64, Arc<dyn Fn(&UrlChange) + Send + Sync>>>,
  next_listener: AtomicU64,
}

/// History stack kept in memory. Cloning shares the same stack.
#[derive(Clone)]
pub struct MemoryHistory {
  inner: Arc<HistoryInner>,
}

impl MemoryHistory {
  pub fn new(initial: &str) -> Self {
    Self {
      inner: Arc::new(HistoryInner {
        entries: Mutex::new(Entries {
          stack: vec![Location::parse(initial)],
          index: 0,
        }),
        listeners: Mutex::new(BTreeMap::new()),
        next_listener: AtomicU64::new(0),
      }),
    }
  }

  /// Step back one entry. Returns false at the start of the stack.
  pub fn back(&self) -> bool {
    let location = {
      let mut entries = self.entries();
      if entries.index == 0 {
        return false;
      }
      entries.index -= 1;
      entries.stack[entries.index].clone()
    };
    self.notify(NavigationAction::Pop, location);
    true
  }

  /// Number of entries in the stack.
  pub fn len(&self) -> usize {
    self.entries().stack.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().stack.is_empty()
  }

  pub fn listener_count(&self) -> usize {
    self
      .inner
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Resolve `path` against the current location.
  fn resolve(&self, path: &str) -> Location {
    let current = self.location();
    if path.starts_with('?') {
      Location::parse(&format!("{}{}", current.pathname, path))
    } else if path.starts_with('#') {
      Location::parse(&format!("{}{}{}", current.pathname, current.search, path))
    } else if path.is_empty() {
      Location {
        pathname: current.pathname,
        ..Location::default()
      }
    } else {
      Location::parse(path)
    }
  }

  fn notify(&self, action: NavigationAction, location: Location) {
    debug!(?action, href = %location.href(), "location changed");

    // Listeners run outside the lock so they may navigate or unsubscribe
    let listeners: Vec<_> = self
      .inner
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .cloned()
      .collect();

    let change = UrlChange { action, location };
    for listener in listeners {
      listener(&change);
    }
  }
}

impl Navigator for MemoryHistory {
  fn location(&self) -> Location {
    let entries = self.entries();
    entries.stack[entries.index].clone()
  }

  fn push(&self, path: &str) {
    let location = self.resolve(path);
    {
      let mut entries = self.entries();
      let keep = entries.index + 1;
      entries.stack.truncate(keep);
      entries.stack.push(location.clone());
      entries.index = keep;
    }
    self.notify(NavigationAction::Push, location);
  }

  fn replace(&self, path: &str) {
    let location = self.resolve(path);
    {
      let mut entries = self.entries();
      let index = entries.index;
      entries.stack[index] = location.clone();
    }
    self.notify(NavigationAction::Replace, location);
  }

  fn listen(&self, listener: UrlListener) -> Subscription {
    let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
    self
      .inner
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(id, Arc::from(listener));

    let inner: Weak<HistoryInner> = Arc::downgrade(&self.inner);
    Subscription::new(move || {
      if let Some(inner) = inner.upgrade() {
        inner
          .listeners
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .remove(&id);
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  fn counting_listener(counter: &Arc<AtomicUsize>) -> UrlListener {
    let counter = Arc::clone(counter);
    Box::new(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn test_replace_keeps_pathname_for_bare_query() {
    let history = MemoryHistory::new("/users?a=1");
    history.replace("?a=2&b=3");

    let location = history.location();
    assert_eq!(location.pathname, "/users");
    assert_eq!(location.search, "?a=2&b=3");
    assert_eq!(history.len(), 1);
  }

  #[test]
  fn test_replace_with_empty_clears_query() {
    let history = MemoryHistory::new("/users?a=1");
    history.replace("");
    assert_eq!(history.location().href(), "/users");
  }

  #[test]
  fn test_push_and_back() {
    let history = MemoryHistory::new("/a");
    history.push("/b");
    history.push("/c");
    assert!(history.back());
    assert_eq!(history.location().pathname, "/b");

    // Pushing after going back drops the forward entries
    history.push("/d");
    assert_eq!(history.len(), 3);
    assert!(history.back());
    assert!(history.back());
    assert!(!history.back());
    assert_eq!(history.location().pathname, "/a");
  }

  #[test]
  fn test_listener_receives_action() {
    let history = MemoryHistory::new("/a");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let _subscription = history.listen(Box::new(move |change| {
      seen_clone.lock().unwrap().push(change.action);
    }));

    history.push("/b");
    history.replace("?x=1");
    history.back();

    assert_eq!(
      *seen.lock().unwrap(),
      vec![
        NavigationAction::Push,
        NavigationAction::Replace,
        NavigationAction::Pop
      ]
    );
  }

  #[test]
  fn test_unsubscribe_is_idempotent() {
    let history = MemoryHistory::new("/a");
    let counter = Arc::new(AtomicUsize::new(0));
    let subscription = history.listen(counting_listener(&counter));

    history.replace("?x=1");
    subscription.unsubscribe();
    subscription.unsubscribe();
    history.replace("?x=2");

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!subscription.is_active());
    assert_eq!(history.listener_count(), 0);
  }

  #[test]
  fn test_drop_unsubscribes() {
    let history = MemoryHistory::new("/a");
    let counter = Arc::new(AtomicUsize::new(0));
    {
      let _subscription = history.listen(counting_listener(&counter));
      assert_eq!(history.listener_count(), 1);
    }
    history.replace("?x=1");
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }
}
