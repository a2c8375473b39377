//! JSON helpers for converting and patching serde types.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Re-serialize a value through JSON to convert between compatible types.
pub fn reserialize<T: DeserializeOwned>(value: impl Serialize) -> serde_json::Result<T> {
  serde_json::from_value(serde_json::to_value(value)?)
}

/// Shallow-merge the top-level fields of `partial` into `current`.
///
/// Missing `current` starts from an empty object, so `partial` must then
/// describe a complete value. Nested objects are replaced, not merged.
pub fn shallow_merge<T, P>(current: Option<&T>, partial: &P) -> Result<T>
where
  T: Serialize + DeserializeOwned,
  P: Serialize + ?Sized,
{
  let Value::Object(patch) = serde_json::to_value(partial)? else {
    return Err(eyre!("Partial update must be a JSON object"));
  };

  let mut base = match current {
    Some(current) => serde_json::to_value(current)?,
    None => Value::Object(Map::new()),
  };
  let Value::Object(fields) = &mut base else {
    return Err(eyre!("Cannot apply a partial update to non-object data"));
  };
  fields.extend(patch);

  reserialize(base).map_err(|e| eyre!("Partial update produced invalid data: {}", e))
}
