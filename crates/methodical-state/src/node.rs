//! Persistent, structurally shared state tree.
//!
//! `Node` mirrors the JSON data model, but strings, arrays and objects sit
//! behind `Arc`. Cloning a tree is O(1), and every write goes through
//! `Arc::make_mut`, so only the nodes on the root-to-target path that are
//! still shared get copied. Untouched siblings stay reference-identical
//! between the old and the new tree, which is what [`Node::ptr_eq`] observes.

use crate::error::{value_type_name, StateError, StateResult};
use crate::{Path, Seg};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Object payload of a [`Node`]. Keys are kept sorted.
pub type Map = BTreeMap<String, Node>;

/// A node of the state tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(Arc<str>),
    Array(Arc<Vec<Node>>),
    Object(Arc<Map>),
}

/// Amount accepted by [`Node::increment`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Amount {
    Int(i64),
    Float(f64),
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount::Int(v)
    }
}

impl From<i32> for Amount {
    fn from(v: i32) -> Self {
        Amount::Int(v as i64)
    }
}

impl From<f64> for Amount {
    fn from(v: f64) -> Self {
        Amount::Float(v)
    }
}

static NULL: Node = Node::Null;

impl Node {
    /// An empty object node.
    #[inline]
    pub fn object() -> Self {
        Node::Object(Arc::new(Map::new()))
    }

    /// An empty array node.
    #[inline]
    pub fn array() -> Self {
        Node::Array(Arc::new(Vec::new()))
    }

    /// Build a tree from any serializable value. Unlike a detour through
    /// `serde_json::Value` this accepts non-finite floats and non-string map
    /// keys; see [`diff_serialized`](crate::diff_serialized) for their form.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> StateResult<Self> {
        Ok(crate::ser::to_node(value)?)
    }

    /// Deserialize this tree into a typed value.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> StateResult<T> {
        Ok(T::deserialize(self.to_value())?)
    }

    /// Deep-convert into a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.to_string()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// True for arrays and objects, the only nodes that can be edited in place.
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Array(_) | Node::Object(_))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Node::Array(_))
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        value_type_name(self)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up an object member.
    #[inline]
    pub fn get_key(&self, key: &str) -> Option<&Node> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up an array element.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<&Node> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// Follow a single segment.
    #[inline]
    pub fn child(&self, seg: &Seg) -> Option<&Node> {
        match seg {
            Seg::Key(k) => self.get_key(k),
            Seg::Index(i) => self.get_index(*i),
        }
    }

    /// Follow a path from this node. The root path returns `self`.
    pub fn get(&self, path: &Path) -> Option<&Node> {
        path.iter().try_fold(self, |node, seg| node.child(seg))
    }

    /// Reference identity.
    ///
    /// Strings, arrays and objects compare their allocations. Null, booleans
    /// and numbers are stored inline, so their identity is their value.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Array(a), Node::Array(b)) => Arc::ptr_eq(a, b),
            (Node::Object(a), Node::Object(b)) => Arc::ptr_eq(a, b),
            (Node::String(a), Node::String(b)) => Arc::ptr_eq(a, b),
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => a == b,
            _ => false,
        }
    }

    fn child_mut(&mut self, seg: &Seg) -> Option<&mut Node> {
        match (self, seg) {
            (Node::Object(map), Seg::Key(k)) => {
                if !map.contains_key(k.as_str()) {
                    return None;
                }
                Arc::make_mut(map).get_mut(k.as_str())
            }
            (Node::Array(items), Seg::Index(i)) => {
                if *i >= items.len() {
                    return None;
                }
                Arc::make_mut(items).get_mut(*i)
            }
            _ => None,
        }
    }

    /// Mutable access to a descendant.
    ///
    /// Every shared node on the way down is copied first, so the returned
    /// reference is exclusively owned by this tree. Returns `None` without
    /// copying anything when the path does not exist.
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Node> {
        self.get(path)?;
        let mut current = self;
        for seg in path {
            current = current.child_mut(seg)?;
        }
        Some(current)
    }

    /// Set a value at `path`, creating intermediate objects where the tree
    /// has `null` or nothing at all.
    ///
    /// Array indices must already exist; use [`Node::push`] or
    /// [`Node::insert`] to grow arrays.
    pub fn set(&mut self, path: &Path, value: impl Into<Node>) -> StateResult<()> {
        set_at(self, path.segments(), value.into(), path)
    }

    /// Remove and return the value at `path`.
    pub fn remove(&mut self, path: &Path) -> StateResult<Node> {
        let Some((parent, last)) = path.split_parent() else {
            return Err(StateError::invalid_operation("cannot remove the root node"));
        };
        if self.get(path).is_none() {
            return Err(StateError::path_not_found(path.clone()));
        }
        let removed = match (self.get_mut(&parent), last) {
            (Some(Node::Object(map)), Seg::Key(k)) => Arc::make_mut(map).remove(k.as_str()),
            (Some(Node::Array(items)), Seg::Index(i)) => Some(Arc::make_mut(items).remove(*i)),
            _ => None,
        };
        removed.ok_or_else(|| StateError::path_not_found(path.clone()))
    }

    /// Append to the array at `path`, creating it when absent.
    pub fn push(&mut self, path: &Path, value: impl Into<Node>) -> StateResult<()> {
        self.array_at_mut(path)?.push(value.into());
        Ok(())
    }

    /// Insert into the array at `path`. `index == len` appends.
    pub fn insert(&mut self, path: &Path, index: usize, value: impl Into<Node>) -> StateResult<()> {
        let items = self.array_at_mut(path)?;
        if index > items.len() {
            return Err(StateError::index_out_of_bounds(
                path.clone(),
                index,
                items.len(),
            ));
        }
        items.insert(index, value.into());
        Ok(())
    }

    /// Add `amount` to the number at `path`.
    pub fn increment(&mut self, path: &Path, amount: impl Into<Amount>) -> StateResult<()> {
        let current = match self.get(path) {
            Some(Node::Number(n)) => n.clone(),
            Some(_) => return Err(StateError::numeric_on_non_number(path.clone())),
            None => return Err(StateError::path_not_found(path.clone())),
        };
        let next = match (current.as_i64(), amount.into()) {
            (Some(i), Amount::Int(a)) => i.checked_add(a).map(serde_json::Number::from).ok_or_else(
                || StateError::invalid_operation(format!("increment overflow at {path}: {i} + {a}")),
            )?,
            (_, amount) => {
                let base = current
                    .as_f64()
                    .ok_or_else(|| StateError::numeric_on_non_number(path.clone()))?;
                let delta = match amount {
                    Amount::Int(a) => a as f64,
                    Amount::Float(a) => a,
                };
                serde_json::Number::from_f64(base + delta).ok_or_else(|| {
                    StateError::invalid_operation(format!(
                        "increment produced a non-finite number at {path}"
                    ))
                })?
            }
        };
        self.set(path, Node::Number(next))
    }

    fn array_at_mut(&mut self, path: &Path) -> StateResult<&mut Vec<Node>> {
        if self.get(path).map_or(true, Node::is_null) {
            self.set(path, Node::array())?;
        }
        match self.get_mut(path) {
            Some(Node::Array(items)) => Ok(Arc::make_mut(items)),
            Some(other) => Err(StateError::type_mismatch(
                path.clone(),
                "array",
                value_type_name(other),
            )),
            None => Err(StateError::path_not_found(path.clone())),
        }
    }
}

fn set_at(current: &mut Node, segments: &[Seg], value: Node, full_path: &Path) -> StateResult<()> {
    match segments {
        [] => {
            *current = value;
            Ok(())
        }
        [Seg::Key(key), rest @ ..] => {
            if current.is_null() {
                *current = Node::object();
            }
            match current {
                Node::Object(map) => {
                    let map = Arc::make_mut(map);
                    if rest.is_empty() {
                        map.insert(key.clone(), value);
                        Ok(())
                    } else {
                        let entry = map.entry(key.clone()).or_insert(Node::Null);
                        set_at(entry, rest, value, full_path)
                    }
                }
                other => Err(StateError::type_mismatch(
                    full_path.clone(),
                    "object",
                    value_type_name(other),
                )),
            }
        }
        [Seg::Index(idx), rest @ ..] => match current {
            Node::Array(items) => {
                if *idx >= items.len() {
                    return Err(StateError::index_out_of_bounds(
                        full_path.clone(),
                        *idx,
                        items.len(),
                    ));
                }
                set_at(&mut Arc::make_mut(items)[*idx], rest, value, full_path)
            }
            other => Err(StateError::type_mismatch(
                full_path.clone(),
                "array",
                value_type_name(other),
            )),
        },
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(Arc::from(s)),
            Value::Array(items) => Node::Array(Arc::new(items.into_iter().map(Node::from).collect())),
            Value::Object(map) => Node::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Node::from(v))).collect(),
            )),
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        node.to_value()
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Array(Arc::new(items))
    }
}

impl From<Map> for Node {
    fn from(map: Map) -> Self {
        Node::Object(Arc::new(map))
    }
}

macro_rules! node_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(v: $ty) -> Self {
                    Node::from(Value::from(v))
                }
            }
        )*
    };
}

node_from_scalar!(bool, i32, i64, u32, u64, usize, f64, String, &str);

impl std::ops::Index<&str> for Node {
    type Output = Node;

    /// Missing keys and non-objects index to `Node::Null`.
    fn index(&self, key: &str) -> &Node {
        self.get_key(key).unwrap_or(&NULL)
    }
}

impl std::ops::Index<usize> for Node {
    type Output = Node;

    fn index(&self, index: usize) -> &Node {
        self.get_index(index).unwrap_or(&NULL)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(n) => n.serialize(serializer),
            Node::String(s) => serializer.serialize_str(s),
            Node::Array(items) => serializer.collect_seq(items.iter()),
            Node::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}
