//! Structural change operations.
//!
//! Each operation describes one change between two versions of a state tree,
//! addressed by path. The shapes follow JSON Patch (`add`, `replace`,
//! `remove`) so they can be shipped to auditing or undo integrations as-is.

use crate::{Node, Path};
use serde::{Deserialize, Serialize};

/// A single structural change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Add a value.
    ///
    /// On an object this sets the key. On an array it inserts at the index,
    /// shifting later elements; `index == len` appends.
    Add {
        /// Target path.
        path: Path,
        /// Value to add.
        value: Node,
    },

    /// Replace an existing value.
    Replace {
        /// Target path (must exist, the root always does).
        path: Path,
        /// New value.
        value: Node,
    },

    /// Remove an existing value.
    Remove {
        /// Target path (must exist).
        path: Path,
    },
}

impl Op {
    /// Create an Add operation.
    #[inline]
    pub fn add(path: Path, value: impl Into<Node>) -> Self {
        Op::Add {
            path,
            value: value.into(),
        }
    }

    /// Create a Replace operation.
    #[inline]
    pub fn replace(path: Path, value: impl Into<Node>) -> Self {
        Op::Replace {
            path,
            value: value.into(),
        }
    }

    /// Create a Remove operation.
    #[inline]
    pub fn remove(path: Path) -> Self {
        Op::Remove { path }
    }

    /// Get the path this operation targets.
    #[inline]
    pub fn path(&self) -> &Path {
        match self {
            Op::Add { path, .. } => path,
            Op::Replace { path, .. } => path,
            Op::Remove { path } => path,
        }
    }

    /// The value carried by `add` / `replace`.
    #[inline]
    pub fn value(&self) -> Option<&Node> {
        match self {
            Op::Add { value, .. } | Op::Replace { value, .. } => Some(value),
            Op::Remove { .. } => None,
        }
    }

    /// Get the operation name.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Op::Add { .. } => "add",
            Op::Replace { .. } => "replace",
            Op::Remove { .. } => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_op_constructors() {
        let add = Op::add(path!("a"), 1);
        assert_eq!(add.name(), "add");
        assert_eq!(add.path(), &path!("a"));
        assert_eq!(add.value().and_then(Node::as_i64), Some(1));

        let remove = Op::remove(path!("b"));
        assert_eq!(remove.name(), "remove");
        assert!(remove.value().is_none());
    }

    #[test]
    fn test_op_wire_shape() {
        let op = Op::replace(path!("todos", 0, "done"), true);
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "replace", "path": ["todos", 0, "done"], "value": true})
        );

        let parsed: Op = serde_json::from_value(json!({"op": "remove", "path": ["x"]})).unwrap();
        assert_eq!(parsed, Op::remove(path!("x")));
    }
}
