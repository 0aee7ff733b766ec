//! Nested configuration values addressed by dotted key paths.
//!
//! Requests, templates and optimization results are all nested documents.
//! They are held as a [`Node`] tree (scalar | mapping | list) and addressed
//! with [`KeyPath`]s such as `ElectricTariff.urdb_label`, so overlaying an
//! override is a typed `set_path` rather than dynamic attribute access.
//!
//! ```
//! use nova_core::{KeyPath, Node};
//!
//! let mut request = Node::empty_map();
//! let path = KeyPath::parse("PV.max_kw").unwrap();
//! request.set_path(&path, Node::from(300.0)).unwrap();
//! assert_eq!(request.get_path(&path).and_then(Node::as_f64), Some(300.0));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ResolutionError;

/// A non-empty sequence of non-empty path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Parse dotted notation. Surrounding whitespace on each segment is trimmed.
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        if raw.trim().is_empty() {
            return Err(ResolutionError::MalformedPath {
                path: raw.to_string(),
                reason: "path is empty".into(),
            });
        }
        Self::from_segments(raw.split('.')).map_err(|err| match err {
            ResolutionError::MalformedPath { reason, .. } => ResolutionError::MalformedPath {
                path: raw.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Build a path from pre-split segments. Segments may contain dots.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect();
        if segments.is_empty() {
            return Err(ResolutionError::MalformedPath {
                path: String::new(),
                reason: "path has no segments".into(),
            });
        }
        if let Some(position) = segments.iter().position(|s| s.is_empty()) {
            return Err(ResolutionError::MalformedPath {
                path: segments.join("."),
                reason: format!("segment {} is empty", position + 1),
            });
        }
        Ok(KeyPath(segments))
    }

    /// Path from a literal known at compile time. Empty segments are dropped
    /// instead of rejected.
    pub fn from_static(raw: &'static str) -> Self {
        KeyPath(
            raw.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn child(&self, segment: &str) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        KeyPath(segments)
    }

    pub fn join(&self, other: &KeyPath) -> KeyPath {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        KeyPath(segments)
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    fn prefix(&self, len: usize) -> String {
        self.0[..len].join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for KeyPath {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPath::parse(s)
    }
}

impl TryFrom<String> for KeyPath {
    type Error = ResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        KeyPath::parse(&value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}

/// Leaf values.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Tree-structured document value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Node {
    Scalar(Scalar),
    List(Vec<Node>),
    Map(BTreeMap<String, Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::empty_map()
    }
}

impl Node {
    pub fn empty_map() -> Self {
        Node::Map(BTreeMap::new())
    }

    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(Scalar::Null) => "null",
            Node::Scalar(Scalar::Bool(_)) => "boolean",
            Node::Scalar(Scalar::Int(_)) | Node::Scalar(Scalar::Float(_)) => "number",
            Node::Scalar(Scalar::Text(_)) => "string",
            Node::List(_) => "list",
            Node::Map(_) => "mapping",
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    /// Null or an empty/whitespace-only string.
    pub fn is_blank(&self) -> bool {
        match self {
            Node::Scalar(Scalar::Null) => true,
            Node::Scalar(Scalar::Text(text)) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Scalar(Scalar::Int(value)) => Some(*value as f64),
            Node::Scalar(Scalar::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Scalar(Scalar::Int(value)) => Some(*value),
            Node::Scalar(Scalar::Float(value)) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Scalar(Scalar::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// A list whose every element is numeric; `None` otherwise.
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        self.as_list()?.iter().map(Node::as_f64).collect()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map()?.get(key)
    }

    pub fn get_path(&self, path: &KeyPath) -> Option<&Node> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.get(segment))
    }

    /// Set the leaf at `path`, creating intermediate mappings as needed.
    ///
    /// Returns the value previously stored at `path`. Descending through an
    /// existing scalar or list is a [`ResolutionError::PathConflict`].
    pub fn set_path(&mut self, path: &KeyPath, value: Node) -> Result<Option<Node>, ResolutionError> {
        let segments = path.segments();
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| ResolutionError::MalformedPath {
                path: path.to_string(),
                reason: "path has no segments".into(),
            })?;
        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            let map = match current {
                Node::Map(map) => map,
                other => {
                    return Err(ResolutionError::PathConflict {
                        path: path.prefix(depth),
                        found: other.kind(),
                    })
                }
            };
            current = map.entry(segment.clone()).or_insert_with(Node::empty_map);
        }
        match current {
            Node::Map(map) => Ok(map.insert(leaf.clone(), value)),
            other => Err(ResolutionError::PathConflict {
                path: path.prefix(parents.len()),
                found: other.kind(),
            }),
        }
    }

    pub fn remove_path(&mut self, path: &KeyPath) -> Option<Node> {
        let (leaf, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = match current {
                Node::Map(map) => map.get_mut(segment)?,
                _ => return None,
            };
        }
        match current {
            Node::Map(map) => map.remove(leaf),
            _ => None,
        }
    }

    /// Every leaf with its path. Lists and empty mappings count as leaves.
    pub fn leaves(&self) -> Vec<(KeyPath, &Node)> {
        let mut out = Vec::new();
        if let Node::Map(map) = self {
            for (key, child) in map {
                collect_leaves(KeyPath(vec![key.clone()]), child, &mut out);
            }
        }
        out
    }
}

fn collect_leaves<'a>(path: KeyPath, node: &'a Node, out: &mut Vec<(KeyPath, &'a Node)>) {
    match node {
        Node::Map(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(path.child(key), child, out);
            }
        }
        _ => out.push((path, node)),
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Int(i)),
                None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Node::Scalar(Scalar::Text(s)),
            Value::Array(items) => Node::List(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => Node::Map(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect()),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            Node::Scalar(Scalar::Int(i)) => Value::Number(i.into()),
            Node::Scalar(Scalar::Float(f)) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            Node::Scalar(Scalar::Text(s)) => Value::String(s),
            Node::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Node::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Scalar(Scalar::Float(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Scalar(Scalar::Bool(value))
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(Scalar::Text(value.to_string()))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(Scalar::Text(value))
    }
}

impl From<Vec<f64>> for Node {
    fn from(values: Vec<f64>) -> Self {
        Node::List(values.into_iter().map(Node::from).collect())
    }
}
