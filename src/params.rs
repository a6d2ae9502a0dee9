//! Request body parameters.
//!
//! Bodies can be given in one of two shapes:
//!
//! 1. [`Params::Flat`]: a list of `"key=value"` strings. This covers most
//!    calls, but values can only be strings or booleans.
//! 2. [`Params::Structured`]: a pre-built JSON object, for bodies that need
//!    lists or nested objects.
//!
//! Both resolve into the same ordered JSON object via [`Params::encode`].

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Body parameters for PUT, POST and DELETE calls.
///
/// # Examples
///
/// ```
/// use dsdk::Params;
/// use serde_json::json;
///
/// let flat = Params::from(["name=vol-1", "replica_count=3", "force=true"]);
/// assert_eq!(
///     serde_json::Value::Object(flat.encode().unwrap()),
///     json!({"name": "vol-1", "replica_count": "3", "force": true})
/// );
///
/// let nested = Params::from(json!({"storage_instances": [{"name": "si-1"}]}));
/// assert_eq!(
///     serde_json::Value::Object(nested.encode().unwrap()),
///     json!({"storage_instances": [{"name": "si-1"}]})
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// `"key=value"` pairs, split on the first `=`.
    Flat(Vec<String>),
    /// A JSON object passed through unchanged.
    Structured(Value),
}

impl Params {
    /// Parameters that encode to an empty object.
    pub fn empty() -> Self {
        Params::Flat(Vec::new())
    }

    /// Resolves the parameters into an ordered JSON object.
    ///
    /// Flat values `"true"` and `"false"` become booleans; every other value
    /// stays a string. A later duplicate key overwrites an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if a flat entry has no `=`, or if a
    /// structured value is not a JSON object.
    pub fn encode(&self) -> Result<Map<String, Value>> {
        match self {
            Params::Flat(pairs) => {
                let mut map = Map::new();
                for pair in pairs {
                    let (key, value) = pair.split_once('=').ok_or_else(|| {
                        Error::Encoding(format!("couldn't parse param '{pair}': expected key=value"))
                    })?;
                    map.insert(key.to_string(), coerce(value));
                }
                Ok(map)
            }
            Params::Structured(Value::Object(map)) => Ok(map.clone()),
            Params::Structured(other) => Err(Error::Encoding(format!(
                "structured params must be a JSON object, got {}",
                kind(other)
            ))),
        }
    }

    /// Encodes the parameters as a JSON request body.
    pub fn to_body(&self) -> Result<Vec<u8>> {
        let map = self.encode()?;
        serde_json::to_vec(&map).map_err(|e| Error::SerializationFailed(e.to_string()))
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::empty()
    }
}

fn coerce(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(value.to_string()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl<const N: usize> From<[&str; N]> for Params {
    fn from(pairs: [&str; N]) -> Self {
        Params::Flat(pairs.iter().map(|p| p.to_string()).collect())
    }
}

impl From<&[&str]> for Params {
    fn from(pairs: &[&str]) -> Self {
        Params::Flat(pairs.iter().map(|p| p.to_string()).collect())
    }
}

impl From<Vec<&str>> for Params {
    fn from(pairs: Vec<&str>) -> Self {
        Params::Flat(pairs.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Params {
    fn from(pairs: Vec<String>) -> Self {
        Params::Flat(pairs)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::Structured(value)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Structured(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_pairs_coerce_booleans() {
        let map = Params::from(["a=1", "b=true", "c=false"]).encode().unwrap();
        assert_eq!(Value::Object(map), json!({"a": "1", "b": true, "c": false}));
    }

    #[test]
    fn flat_pairs_keep_insertion_order() {
        let map = Params::from(["zeta=1", "alpha=2", "mid=3"]).encode().unwrap();
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn flat_pairs_split_on_first_equals() {
        let map = Params::from(["filter=name=vol-1"]).encode().unwrap();
        assert_eq!(map["filter"], json!("name=vol-1"));
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let map = Params::from(["a=1", "a=2"]).encode().unwrap();
        assert_eq!(Value::Object(map), json!({"a": "2"}));
    }

    #[test]
    fn structured_passes_through() {
        let body = json!({"x": [1, 2], "nested": {"y": null}});
        let map = Params::from(body.clone()).encode().unwrap();
        assert_eq!(Value::Object(map), body);
    }

    #[test]
    fn empty_params_encode_to_empty_object() {
        assert!(Params::empty().encode().unwrap().is_empty());
        assert_eq!(Params::default().to_body().unwrap(), b"{}");
    }

    #[test]
    fn pair_without_equals_is_rejected() {
        let err = Params::from(["novalue"]).encode().unwrap_err();
        assert!(matches!(err, Error::Encoding(msg) if msg.contains("novalue")));
    }

    #[test]
    fn non_object_structured_is_rejected() {
        let err = Params::from(json!([1, 2, 3])).encode().unwrap_err();
        assert!(matches!(err, Error::Encoding(msg) if msg.contains("array")));
    }
}
