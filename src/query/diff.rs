//! Refetch gating: decides whether a query change is relevant.

use super::codec::QueryMap;

/// Whether moving from `old` to `new` should trigger a refetch.
///
/// - `None` observes every key: any difference counts.
/// - `Some(&[])` observes nothing.
/// - Otherwise only the listed keys are compared. A key missing on one side
///   differs from a present value on the other.
pub fn should_refetch(old: &QueryMap, new: &QueryMap, observed: Option<&[String]>) -> bool {
  match observed {
    None => old != new,
    Some(keys) => keys.iter().any(|key| old.get(key) != new.get(key)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
  }

  #[test]
  fn test_observe_all() {
    let old = QueryMap::new().with("a", "1");
    assert!(!should_refetch(&old, &old.clone(), None));
    assert!(should_refetch(&old, &QueryMap::new().with("a", "2"), None));
    assert!(should_refetch(&old, &old.applied(&QueryMap::new().with("b", "1")), None));
  }

  #[test]
  fn test_observe_all_ignores_empty_keys() {
    let old = QueryMap::new().with("a", "1");
    let new = QueryMap::new().with("a", "1").without("b");
    assert!(!should_refetch(&old, &new, None));
  }

  #[test]
  fn test_observe_nothing() {
    let old = QueryMap::new().with("a", "1");
    let new = QueryMap::new().with("a", "2").with("b", "3");
    assert!(!should_refetch(&old, &new, Some(&[])));
  }

  #[test]
  fn test_observe_subset() {
    let observed = keys(&["page"]);
    let old = QueryMap::new().with("page", "1").with("sort", "asc");

    let sort_only = old.applied(&QueryMap::new().with("sort", "desc"));
    assert!(!should_refetch(&old, &sort_only, Some(&observed)));

    let page_changed = old.applied(&QueryMap::new().with("page", "2"));
    assert!(should_refetch(&old, &page_changed, Some(&observed)));

    let page_removed = old.applied(&QueryMap::new().without("page"));
    assert!(should_refetch(&old, &page_removed, Some(&observed)));
  }

  #[test]
  fn test_observe_subset_compares_whole_lists() {
    let observed = keys(&["tag"]);
    let old = QueryMap::new().with_values("tag", ["a", "b"]);
    let reordered = QueryMap::new().with_values("tag", ["b", "a"]);
    assert!(should_refetch(&old, &reordered, Some(&observed)));
  }
}
