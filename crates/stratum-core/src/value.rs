//! Tagged configuration values and the deep-merge rule used by every layer
//! of the configuration precedence chain.
//!
//! The merge rule is encoded in the shape of [`ConfigValue`]: two
//! [`ConfigValue::Object`]s merge key by key, and any other pairing is a
//! replacement by the later value. Arrays are never concatenated.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// A leaf value: anything that is neither an object nor an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// A configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Object(BTreeMap<String, ConfigValue>),
    Array(Vec<ConfigValue>),
    Scalar(Scalar),
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::empty()
    }
}

impl ConfigValue {
    /// An empty object, the identity element of [`ConfigValue::merge`].
    pub fn empty() -> Self {
        ConfigValue::Object(BTreeMap::new())
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Merge `overlay` on top of `self` and return the result.
    pub fn merge(mut self, overlay: ConfigValue) -> ConfigValue {
        self.merge_in_place(overlay);
        self
    }

    /// In-place variant of [`ConfigValue::merge`].
    pub fn merge_in_place(&mut self, overlay: ConfigValue) {
        match (self, overlay) {
            (ConfigValue::Object(base), ConfigValue::Object(over)) => {
                for (key, value) in over {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge_in_place(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (slot, replacement) => *slot = replacement,
        }
    }

    /// Look up a dotted path (`a.b.c`). Numeric segments index into arrays.
    pub fn get_path(&self, path: &str) -> Option<&ConfigValue> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |current, segment| match current {
            ConfigValue::Object(map) => map.get(segment),
            ConfigValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            ConfigValue::Scalar(_) => None,
        })
    }

    /// Dotted paths of every leaf. Arrays, scalars and empty objects are
    /// leaves; non-empty objects only contribute their children.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_leaves(self, String::new(), &mut out);
        out
    }

    pub fn into_json(self) -> Value {
        self.into()
    }
}

fn collect_leaves(value: &ConfigValue, prefix: String, out: &mut Vec<String>) {
    match value {
        ConfigValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaves(child, path, out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(prefix);
            }
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                ConfigValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Array(items) => ConfigValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Null => ConfigValue::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            ConfigValue::Array(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            ConfigValue::Scalar(Scalar::Null) => Value::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            ConfigValue::Scalar(Scalar::Number(n)) => Value::Number(n),
            ConfigValue::Scalar(Scalar::String(s)) => Value::String(s),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ConfigValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cv(value: Value) -> ConfigValue {
        value.into()
    }

    #[test]
    fn objects_merge_recursively() {
        let base = cv(json!({"a": {"x": 1, "y": 2}, "b": true}));
        let merged = base.merge(cv(json!({"a": {"y": 3, "z": 4}})));
        assert_eq!(
            merged.into_json(),
            json!({"a": {"x": 1, "y": 3, "z": 4}, "b": true})
        );
    }

    #[test]
    fn arrays_are_replaced_not_appended() {
        let merged = cv(json!({"list": [1, 2]})).merge(cv(json!({"list": [3]})));
        assert_eq!(merged.into_json(), json!({"list": [3]}));
    }

    #[test]
    fn scalar_replaces_object_and_back() {
        let merged = cv(json!({"a": {"b": 1}})).merge(cv(json!({"a": "flat"})));
        assert_eq!(merged.clone().into_json(), json!({"a": "flat"}));

        let merged = merged.merge(cv(json!({"a": {"c": 2}})));
        assert_eq!(merged.into_json(), json!({"a": {"c": 2}}));
    }

    #[test]
    fn null_overlay_replaces() {
        let merged = cv(json!({"a": 1})).merge(cv(json!({"a": null})));
        assert_eq!(merged.into_json(), json!({"a": null}));
    }

    #[test]
    fn disjoint_keys_survive() {
        let merged = cv(json!({"only_base": 1})).merge(cv(json!({"only_overlay": 2})));
        assert_eq!(merged.into_json(), json!({"only_base": 1, "only_overlay": 2}));
    }

    #[test]
    fn get_path_walks_objects_and_arrays() {
        let value = cv(json!({"a": {"list": [{"name": "x"}]}}));
        assert_eq!(
            value.get_path("a.list.0.name"),
            Some(&ConfigValue::Scalar(Scalar::String("x".into())))
        );
        assert!(value.get_path("a.missing").is_none());
    }

    #[test]
    fn leaf_paths_treat_arrays_as_leaves() {
        let value = cv(json!({"a": {"b": 1, "c": [1, 2]}, "d": {}}));
        assert_eq!(value.leaf_paths(), vec!["a.b", "a.c", "d"]);
    }
}
