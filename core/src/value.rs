//! # Value: the closed context value model
//!
//! Frame contexts can only hold the variants of [`Value`]. Decoding a token
//! therefore reconstructs plain data and nothing else: there is no path from
//! signed bytes to application types or code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deepest list/map nesting a context value may have.
///
/// Frames and the transfer wrapper add a few JSON levels on top, and the whole
/// document must stay under serde_json's recursion limit of 128.
pub const MAX_NESTING: usize = 96;

/// A context value.
///
/// Serialized untagged, so the wire form is plain JSON. Integers are tried
/// before floats, which keeps `1` and `1.0` distinct across a round trip.
/// Non-finite floats have no JSON form; [`Value::check_encodable`] rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Checks that the value decodes back to itself: every float is finite and
    /// containers nest at most [`MAX_NESTING`] levels.
    pub fn check_encodable(&self) -> Result<(), String> {
        self.check_at(1)
    }

    fn check_at(&self, depth: usize) -> Result<(), String> {
        match self {
            Value::Float(f) if !f.is_finite() => Err(format!("non-finite float {f}")),
            Value::List(_) | Value::Map(_) if depth > MAX_NESTING => Err(format!(
                "nested deeper than {MAX_NESTING} levels"
            )),
            Value::List(items) => items.iter().try_for_each(|v| v.check_at(depth + 1)),
            Value::Map(map) => map.values().try_for_each(|v| v.check_at(depth + 1)),
            _ => Ok(()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Value::Map(ctx.0)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The local variables of one frame.
///
/// Keys are kept sorted so that equal contexts always serialize to equal bytes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Inserts a value, returning the previous one if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Overwrites entries of `self` with every entry of `other`.
    pub fn merge(&mut self, other: &Context) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// [`Value::check_encodable`] for every entry; the error names the key.
    pub fn check_encodable(&self) -> Result<(), String> {
        self.0
            .iter()
            .try_for_each(|(k, v)| v.check_encodable().map_err(|e| format!("`{k}`: {e}")))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_and_float_stay_distinct() {
        let ctx = Context::new().with("i", 1i64).with("f", 1.0f64);
        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();

        assert_eq!(back.get("i"), Some(&Value::Int(1)));
        assert_eq!(back.get("f"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut ctx = Context::new().with("a", 1).with("b", "keep");
        ctx.merge(&Context::new().with("a", 2).with("c", true));

        assert_eq!(ctx.get_i64("a"), Some(2));
        assert_eq!(ctx.get_str("b"), Some("keep"));
        assert_eq!(ctx.get_bool("c"), Some(true));
    }

    fn nested_list(levels: usize) -> Value {
        (0..levels).fold(Value::Int(0), |inner, _| Value::List(vec![inner]))
    }

    #[test]
    fn test_non_finite_floats_are_not_encodable() {
        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let ctx = Context::new().with("ok", 1.5).with("x", vec![Value::Float(f)]);
            let err = ctx.check_encodable().unwrap_err();
            assert!(err.starts_with("`x`: non-finite"), "{err}");
        }
        assert!(Value::Float(-0.0).check_encodable().is_ok());
    }

    #[test]
    fn test_nesting_limit() {
        assert!(nested_list(MAX_NESTING).check_encodable().is_ok());
        let err = nested_list(MAX_NESTING + 1).check_encodable().unwrap_err();
        assert!(err.contains("nested deeper"));
    }

    #[test]
    fn test_keys_are_sorted() {
        let ctx = Context::new().with("zeta", 0).with("alpha", 0).with("mid", 0);
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
    }
}
