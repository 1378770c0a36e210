//! Config tree values and snapshots
//!
//! The tree is a nest of [`Group`]s whose leaves are numbers, strings,
//! booleans or colors. Copies are always deep: `Clone` walks the whole tree,
//! so no two trees ever share a node.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::color::HexColor;
use crate::config::path::ConfigPath;
use crate::error::StoreError;

/// Named children of a group node, ordered by name
pub type Group = BTreeMap<String, ConfigValue>;

/// One node of the config tree
#[derive(Debug, PartialEq)]
pub enum ConfigValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Color(HexColor),
    Group(Group),
}

/// Coarse kind of a node, used when matching values against the typed schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    Bool,
    Color,
    Group,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Bool => "bool",
            ValueKind::Color => "color",
            ValueKind::Group => "group",
        };
        f.write_str(name)
    }
}

impl ConfigValue {
    /// Recursive copy of this node and everything below it
    pub fn deep_copy(&self) -> ConfigValue {
        match self {
            ConfigValue::Number(n) => ConfigValue::Number(*n),
            ConfigValue::Text(s) => ConfigValue::Text(s.clone()),
            ConfigValue::Bool(b) => ConfigValue::Bool(*b),
            ConfigValue::Color(c) => ConfigValue::Color(*c),
            ConfigValue::Group(group) => ConfigValue::Group(copy_group(group)),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Number(_) => ValueKind::Number,
            ConfigValue::Text(_) => ValueKind::Text,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Color(_) => ValueKind::Color,
            ConfigValue::Group(_) => ValueKind::Group,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<HexColor> {
        match self {
            ConfigValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            ConfigValue::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ConfigValue::Group(_))
    }

    /// Convert a JSON value into a config node.
    ///
    /// Strings starting with `#` that parse as hex colors become
    /// [`ConfigValue::Color`]; every other string stays text.
    pub fn from_json(json: serde_json::Value) -> Result<Self, StoreError> {
        use serde_json::Value;

        match json {
            Value::Bool(b) => Ok(ConfigValue::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .map(ConfigValue::Number)
                .ok_or_else(|| {
                    StoreError::UnsupportedValue(format!("number {n} does not fit f64"))
                }),
            Value::String(s) => match s.starts_with('#').then(|| HexColor::parse(&s)).flatten() {
                Some(color) => Ok(ConfigValue::Color(color)),
                None => Ok(ConfigValue::Text(s)),
            },
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| Ok((key, ConfigValue::from_json(value)?)))
                .collect::<Result<Group, StoreError>>()
                .map(ConfigValue::Group),
            Value::Null => Err(StoreError::UnsupportedValue("null".to_string())),
            Value::Array(_) => Err(StoreError::UnsupportedValue(
                "arrays are not config values".to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            ConfigValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ConfigValue::Text(s) => Value::String(s.clone()),
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Color(c) => Value::String(c.to_string()),
            ConfigValue::Group(group) => Value::Object(
                group
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Clone for ConfigValue {
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}

/// Deep copy of every child in `group`
pub fn copy_group(group: &Group) -> Group {
    group
        .iter()
        .map(|(key, value)| (key.clone(), value.deep_copy()))
        .collect()
}

/// Node at `path`, if every segment resolves
pub(crate) fn lookup<'a>(root: &'a Group, path: &ConfigPath) -> Option<&'a ConfigValue> {
    let (parents, leaf) = path.split_last();
    let mut node = root;
    for segment in parents {
        node = node.get(segment)?.as_group()?;
    }
    node.get(leaf)
}

/// Assign `value` at `path`, creating missing groups on the way down.
///
/// Returns whatever the slot held before. Fails without touching the tree
/// if an existing leaf sits where a group is needed.
pub(crate) fn assign(
    root: &mut Group,
    path: &ConfigPath,
    value: ConfigValue,
) -> Result<Option<ConfigValue>, StoreError> {
    let (parents, leaf) = path.split_last();
    let mut node = root;
    for (depth, segment) in parents.iter().enumerate() {
        let child = node
            .entry(segment.clone())
            .or_insert_with(|| ConfigValue::Group(Group::new()));
        node = match child {
            ConfigValue::Group(group) => group,
            _ => {
                return Err(StoreError::NotAGroup {
                    path: path.to_string(),
                    segment: path.prefix(depth + 1),
                });
            }
        };
    }
    Ok(node.insert(leaf.to_string(), value))
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Number(n) => serializer.serialize_f64(*n),
            ConfigValue::Text(s) => serializer.serialize_str(s),
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Color(c) => c.serialize(serializer),
            ConfigValue::Group(group) => group.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        ConfigValue::from_json(json).map_err(serde::de::Error::custom)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Number(f64::from(value))
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<HexColor> for ConfigValue {
    fn from(value: HexColor) -> Self {
        ConfigValue::Color(value)
    }
}

impl From<Group> for ConfigValue {
    fn from(value: Group) -> Self {
        ConfigValue::Group(value)
    }
}

/// Independent deep copy of a whole config tree at one point in time.
///
/// Owned by whoever received it; editing it never reaches the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    root: Group,
}

impl Snapshot {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    pub(crate) fn copy_of(root: &Group) -> Self {
        Self { root: copy_group(root) }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Node at `path`; `None` for unknown or malformed paths
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        let path = ConfigPath::parse(path).ok()?;
        lookup(&self.root, &path)
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_number()
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_text()
    }

    pub fn boolean(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn color(&self, path: &str) -> Option<HexColor> {
        self.get(path)?.as_color()
    }

    /// Edit this copy in place, with the same rules as the store's `set`
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) -> Result<(), StoreError> {
        let path = ConfigPath::parse(path)?;
        assign(&mut self.root, &path, value.into()).map(|_| ())
    }

    pub fn to_json(&self) -> serde_json::Value {
        ConfigValue::Group(copy_group(&self.root)).to_json()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}
