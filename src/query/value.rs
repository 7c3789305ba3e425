//! Ordered query parameter tree and its bracket-notation flattening.
//!
//! The data API reads parameters the way Rack/Plug parse them: a nested key
//! path `a.b.c` arrives as `a[b][c]=value`. Maps keep insertion order so the
//! output is stable for a given input.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

/// Characters left unescaped, matching ECMAScript `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode one key segment or value.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Absent value; produces no pair.
    Null,
    Scalar(String),
    /// Opaque leaf: elements are rendered and joined with `,`.
    List(Vec<QueryValue>),
    /// Nested object, flattened with brackets.
    Map(Vec<(String, QueryValue)>),
}

impl QueryValue {
    pub fn scalar(value: impl ToString) -> Self {
        QueryValue::Scalar(value.to_string())
    }

    pub fn map() -> Self {
        QueryValue::Map(Vec::new())
    }

    /// Insert into a map, replacing an existing key in place.
    /// No-op on non-map values.
    pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) {
        if let QueryValue::Map(entries) = self {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: QueryValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Render a leaf the way it appears inside a list.
    fn render_leaf(&self) -> String {
        match self {
            QueryValue::Null => String::new(),
            QueryValue::Scalar(s) => s.clone(),
            QueryValue::List(items) => {
                items.iter().map(QueryValue::render_leaf).collect::<Vec<_>>().join(",")
            },
            QueryValue::Map(_) => serde_json::to_string(&self.to_json()).unwrap_or_default(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            QueryValue::Null => Value::Null,
            QueryValue::Scalar(s) => Value::String(s.clone()),
            QueryValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            QueryValue::Map(entries) => Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Flatten a top-level map into `key=value` pairs joined with `&`.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        if let QueryValue::Map(entries) = self {
            flatten_entries(entries, None, &mut pairs);
        }
        pairs.join("&")
    }
}

impl From<&Value> for QueryValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Scalar(b.to_string()),
            Value::Number(n) => QueryValue::Scalar(n.to_string()),
            Value::String(s) => QueryValue::Scalar(s.clone()),
            Value::Array(items) => QueryValue::List(items.iter().map(QueryValue::from).collect()),
            Value::Object(obj) => QueryValue::Map(
                obj.iter().map(|(k, v)| (k.clone(), QueryValue::from(v))).collect(),
            ),
        }
    }
}

fn flatten_entries(entries: &[(String, QueryValue)], parent: Option<&str>, out: &mut Vec<String>) {
    for (key, value) in entries {
        let nested_key = match parent {
            Some(parent) => format!("{}[{}]", parent, encode_component(key)),
            None => encode_component(key),
        };
        match value {
            QueryValue::Map(children) => flatten_entries(children, Some(&nested_key), out),
            QueryValue::Null => {},
            QueryValue::Scalar(s) if s.is_empty() => {},
            QueryValue::Scalar(s) => out.push(format!("{}={}", nested_key, encode_component(s))),
            QueryValue::List(_) => {
                out.push(format!("{}={}", nested_key, encode_component(&value.render_leaf())))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_component_matches_uri_component() {
        assert_eq!(encode_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("[]{}\":,"), "%5B%5D%7B%7D%22%3A%2C");
        assert_eq!(encode_component("é"), "%C3%A9");
    }

    #[test]
    fn test_nested_objects_flatten_to_any_depth() {
        let value = QueryValue::from(&json!({"a": {"b": {"c": "x"}}}));
        assert_eq!(value.to_query_string(), "a[b][c]=x");

        let deep = QueryValue::from(&json!({"a": {"b": {"c": {"d": {"e": 1}}}}}));
        assert_eq!(deep.to_query_string(), "a[b][c][d][e]=1");
    }

    #[test]
    fn test_arrays_are_opaque_leaves() {
        let value = QueryValue::from(&json!({"ids": [1, 2, 3], "f": {"tags": ["a", "b"]}}));
        assert_eq!(value.to_query_string(), "f[tags]=a%2Cb&ids=1%2C2%2C3");
    }

    #[test]
    fn test_null_and_empty_leaves_dropped() {
        let value = QueryValue::map()
            .with("a", QueryValue::Null)
            .with("b", QueryValue::scalar(""))
            .with("c", QueryValue::scalar("1"))
            .with("d", QueryValue::map());
        assert_eq!(value.to_query_string(), "c=1");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut value = QueryValue::map()
            .with("first", QueryValue::scalar(1))
            .with("second", QueryValue::scalar(2));
        value.insert("first", QueryValue::scalar(9));
        assert_eq!(value.to_query_string(), "first=9&second=2");
    }

    #[test]
    fn test_keys_are_encoded() {
        let value = QueryValue::map().with("a b", QueryValue::map().with("c&d", QueryValue::scalar("v")));
        assert_eq!(value.to_query_string(), "a%20b[c%26d]=v");
    }
}
