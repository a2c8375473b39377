//! Conversion between raw query strings and [`QueryMap`].
//!
//! Both ordinary search strings (`?a=1&b=2`) and hash-routed locations
//! (`#/users?a=1`) decode to the same structure. Malformed segments are
//! dropped rather than reported.

use std::collections::BTreeMap;
use std::fmt;
use url::form_urlencoded;

/// Structured URL query: key to ordered list of values.
///
/// A key mapped to an empty list is the same as an absent key. Equality,
/// iteration and encoding all skip such keys, but [`QueryMap::apply`] reads
/// them as "remove this key", so fragments can clear values.
#[derive(Clone, Default)]
pub struct QueryMap {
  entries: BTreeMap<String, Vec<String>>,
}

impl QueryMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder: set `key` to a single value.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.entries.insert(key.into(), vec![value.into()]);
    self
  }

  /// Builder: set `key` to a list of values.
  pub fn with_values<I, V>(mut self, key: impl Into<String>, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<String>,
  {
    self
      .entries
      .insert(key.into(), values.into_iter().map(Into::into).collect());
    self
  }

  /// Builder: mark `key` as cleared. Applying this fragment removes the key.
  pub fn without(mut self, key: impl Into<String>) -> Self {
    self.entries.insert(key.into(), Vec::new());
    self
  }

  /// Append a value to `key`, keeping earlier values.
  pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.entries.entry(key.into()).or_default().push(value.into());
  }

  pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
    self.entries.insert(key.into(), values);
  }

  pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
    self.entries.remove(key).filter(|v| !v.is_empty())
  }

  /// Values for `key`, or `None` if absent or empty.
  pub fn get(&self, key: &str) -> Option<&[String]> {
    self
      .entries
      .get(key)
      .filter(|v| !v.is_empty())
      .map(Vec::as_slice)
  }

  /// First value for `key`.
  pub fn first(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(|v| v.first()).map(String::as_str)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Non-empty entries in key order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self
      .entries
      .iter()
      .filter(|(_, v)| !v.is_empty())
      .map(|(k, v)| (k.as_str(), v.as_slice()))
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  pub fn is_empty(&self) -> bool {
    self.iter().next().is_none()
  }

  /// Copy with empty keys dropped.
  pub fn normalized(&self) -> Self {
    Self {
      entries: self
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_vec()))
        .collect(),
    }
  }

  /// Merge `other` into `self`, concatenating lists at duplicate keys.
  pub fn merge(&mut self, other: &QueryMap) {
    for (key, values) in &other.entries {
      self
        .entries
        .entry(key.clone())
        .or_default()
        .extend(values.iter().cloned());
    }
  }

  /// Merge a sequence of fragments with [`QueryMap::merge`].
  pub fn merge_all<I>(fragments: I) -> Self
  where
    I: IntoIterator<Item = QueryMap>,
  {
    fragments.into_iter().fold(Self::new(), |mut acc, fragment| {
      acc.merge(&fragment);
      acc
    })
  }

  /// Write `fragment` onto `self` key by key: a listed key replaces the
  /// existing values, an empty list removes the key.
  pub fn apply(&mut self, fragment: &QueryMap) {
    for (key, values) in &fragment.entries {
      if values.is_empty() {
        self.entries.remove(key);
      } else {
        self.entries.insert(key.clone(), values.clone());
      }
    }
  }

  /// [`QueryMap::apply`] returning a new map.
  pub fn applied(&self, fragment: &QueryMap) -> Self {
    let mut next = self.clone();
    next.apply(fragment);
    next
  }
}

impl PartialEq for QueryMap {
  fn eq(&self, other: &Self) -> bool {
    self.iter().eq(other.iter())
  }
}

impl Eq for QueryMap {}

impl fmt::Debug for QueryMap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map().entries(self.iter()).finish()
  }
}

impl fmt::Display for QueryMap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&encode(self))
  }
}

impl<K, V> FromIterator<(K, V)> for QueryMap
where
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut map = Self::new();
    for (key, value) in iter {
      map.push(key, value);
    }
    map
  }
}

/// Parse a search string or hash fragment into a [`QueryMap`].
///
/// Accepts `?a=1`, `a=1`, and `#/path?a=1`. Repeated keys collect into a list
/// in order of appearance. Segments without a key are skipped.
pub fn decode(raw: &str) -> QueryMap {
  let mut query = QueryMap::new();

  for (key, value) in form_urlencoded::parse(strip_query_prefix(raw).as_bytes()) {
    if key.is_empty() {
      continue;
    }
    query.push(key.into_owned(), value.into_owned());
  }

  query
}

/// Serialize a [`QueryMap`] into a search string.
///
/// Returns `?k=v&k=w` for non-empty maps and `""` otherwise.
pub fn encode(query: &QueryMap) -> String {
  let mut serializer = form_urlencoded::Serializer::new(String::new());
  for (key, values) in query.iter() {
    for value in values {
      serializer.append_pair(key, value);
    }
  }

  let encoded = serializer.finish();
  if encoded.is_empty() {
    String::new()
  } else {
    format!("?{}", encoded)
  }
}

fn strip_query_prefix(raw: &str) -> &str {
  if let Some(hash) = raw.strip_prefix('#') {
    return hash.split_once('?').map(|(_, query)| query).unwrap_or("");
  }
  raw.strip_prefix('?').unwrap_or(raw)
}

/// Browser-style location split into its three parts.
///
/// `search` keeps its leading `?` and `hash` its leading `#`, each empty
/// when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
  pub pathname: String,
  pub search: String,
  pub hash: String,
}

impl Location {
  /// Parse an absolute URL or a path such as `/users?a=1#top`.
  pub fn parse(raw: &str) -> Self {
    if let Ok(url) = url::Url::parse(raw) {
      return Self {
        pathname: url.path().to_string(),
        search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
        hash: url.fragment().map(|h| format!("#{}", h)).unwrap_or_default(),
      };
    }

    let (rest, hash) = match raw.find('#') {
      Some(i) => (&raw[..i], &raw[i..]),
      None => (raw, ""),
    };
    let (pathname, search) = match rest.find('?') {
      Some(i) => (&rest[..i], &rest[i..]),
      None => (rest, ""),
    };

    Self {
      pathname: if pathname.is_empty() {
        "/".to_string()
      } else {
        pathname.to_string()
      },
      search: if search == "?" { "" } else { search }.to_string(),
      hash: if hash == "#" { "" } else { hash }.to_string(),
    }
  }

  /// Path, search and hash joined back together.
  pub fn href(&self) -> String {
    format!("{}{}{}", self.pathname, self.search, self.hash)
  }

  /// Whether the logical route lives in the hash (`#/path?query`).
  pub fn is_hash_routed(&self) -> bool {
    self.search.is_empty() && (self.hash.starts_with("#/") || self.hash.contains('?'))
  }

  /// Copy of this location with its query replaced.
  ///
  /// Hash-routed locations get the query written inside the hash so the
  /// logical pathname is preserved.
  pub fn with_query(&self, query: &QueryMap) -> Self {
    let search = encode(query);

    if self.is_hash_routed() {
      let hash_path = self
        .hash
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(&self.hash);
      return Self {
        pathname: self.pathname.clone(),
        search: String::new(),
        hash: format!("{}{}", hash_path, search),
      };
    }

    Self {
      pathname: self.pathname.clone(),
      search,
      hash: self.hash.clone(),
    }
  }
}

/// Logical pathname and query of a location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlComponents {
  pub pathname: String,
  pub query: QueryMap,
}

/// Extract the logical pathname and query.
///
/// When `search` is empty the query is read from the first `?` inside the
/// hash, and the hash path before it becomes the pathname.
pub fn url_components(location: &Location) -> UrlComponents {
  if location.is_hash_routed() {
    let hash = location.hash.trim_start_matches('#');
    let (path, _) = hash.split_once('?').unwrap_or((hash, ""));
    return UrlComponents {
      pathname: if path.is_empty() {
        location.pathname.clone()
      } else {
        path.to_string()
      },
      query: decode(&location.hash),
    };
  }

  UrlComponents {
    pathname: location.pathname.clone(),
    query: decode(&location.search),
  }
}

/// Shorthand for `url_components(location).query`.
pub fn url_query(location: &Location) -> QueryMap {
  url_components(location).query
}
