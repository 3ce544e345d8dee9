//! Error types for state tree operations.

use crate::{Node, Path};
use thiserror::Error;

/// Result type alias for state tree operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading, editing or patching a state tree.
#[derive(Debug, Error)]
pub enum StateError {
    /// Path does not exist in the tree.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The path that was not found.
        path: Path,
    },

    /// Array index is out of bounds.
    #[error("index {index} out of bounds (len: {len}) at path {path}")]
    IndexOutOfBounds {
        /// The path to the array.
        path: Path,
        /// The index that was accessed.
        index: usize,
        /// The actual length of the array.
        len: usize,
    },

    /// A segment addressed a node of the wrong kind.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: Path,
        expected: &'static str,
        found: &'static str,
    },

    /// Numeric operation on a non-numeric value.
    #[error("numeric operation requires number at {path}")]
    NumericOperationOnNonNumber { path: Path },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Conversion between a typed value and a tree failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        StateError::PathNotFound { path }
    }

    #[inline]
    pub fn index_out_of_bounds(path: Path, index: usize, len: usize) -> Self {
        StateError::IndexOutOfBounds { path, index, len }
    }

    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        StateError::TypeMismatch {
            path,
            expected,
            found,
        }
    }

    #[inline]
    pub fn numeric_on_non_number(path: Path) -> Self {
        StateError::NumericOperationOnNonNumber { path }
    }

    #[inline]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        StateError::InvalidOperation {
            message: message.into(),
        }
    }
}

/// Get the type name of a tree node.
#[inline]
pub fn value_type_name(v: &Node) -> &'static str {
    match v {
        Node::Null => "null",
        Node::Bool(_) => "boolean",
        Node::Number(_) => "number",
        Node::String(_) => "string",
        Node::Array(_) => "array",
        Node::Object(_) => "object",
    }
}
