//! Patch application.
//!
//! `apply_patch` is pure: it clones the root (O(1)) and edits the clone, so
//! the input tree is never modified and untouched branches stay shared.

use crate::error::{value_type_name, StateError, StateResult};
use crate::{Node, Op, Patch, Path, Seg};
use std::sync::Arc;

/// Apply a patch to a tree and return the new tree.
///
/// # Examples
///
/// ```
/// use methodical_state::{apply_patch, Node, Op, Patch, path};
/// use serde_json::json;
///
/// let doc = Node::from(json!({"count": 0}));
/// let patch = Patch::new()
///     .with_op(Op::replace(path!("count"), 10))
///     .with_op(Op::add(path!("name"), "test"));
///
/// let next = apply_patch(&doc, &patch).unwrap();
/// assert_eq!(next["count"].as_i64(), Some(10));
/// assert_eq!(next["name"].as_str(), Some("test"));
/// assert_eq!(doc["count"].as_i64(), Some(0));
/// ```
pub fn apply_patch(doc: &Node, patch: &Patch) -> StateResult<Node> {
    let mut result = doc.clone();
    for op in patch.ops() {
        apply_op(&mut result, op)?;
    }
    Ok(result)
}

/// Apply several patches in sequence. Stops at the first failing patch.
pub fn apply_patches<'a>(
    doc: &Node,
    patches: impl IntoIterator<Item = &'a Patch>,
) -> StateResult<Node> {
    patches
        .into_iter()
        .try_fold(doc.clone(), |acc, patch| apply_patch(&acc, patch))
}

/// Apply a single operation in place.
pub(crate) fn apply_op(doc: &mut Node, op: &Op) -> StateResult<()> {
    match op {
        Op::Add { path, value } => apply_add(doc, path, value.clone()),
        Op::Replace { path, value } => apply_replace(doc, path, value.clone()),
        Op::Remove { path } => doc.remove(path).map(|_| ()),
    }
}

fn apply_add(doc: &mut Node, path: &Path, value: Node) -> StateResult<()> {
    let Some((parent_path, last)) = path.split_parent() else {
        *doc = value;
        return Ok(());
    };
    let container = doc
        .get_mut(&parent_path)
        .ok_or_else(|| StateError::path_not_found(parent_path.clone()))?;

    match (container, last) {
        (Node::Object(map), Seg::Key(key)) => {
            Arc::make_mut(map).insert(key.clone(), value);
            Ok(())
        }
        (Node::Array(items), Seg::Index(index)) => {
            if *index > items.len() {
                return Err(StateError::index_out_of_bounds(
                    path.clone(),
                    *index,
                    items.len(),
                ));
            }
            Arc::make_mut(items).insert(*index, value);
            Ok(())
        }
        (Node::Object(_), Seg::Index(_)) => Err(StateError::type_mismatch(
            parent_path,
            "array",
            "object",
        )),
        (other, Seg::Key(_)) => Err(StateError::type_mismatch(
            parent_path,
            "object",
            value_type_name(other),
        )),
        (other, Seg::Index(_)) => Err(StateError::type_mismatch(
            parent_path,
            "array",
            value_type_name(other),
        )),
    }
}

fn apply_replace(doc: &mut Node, path: &Path, value: Node) -> StateResult<()> {
    let target = doc
        .get_mut(path)
        .ok_or_else(|| StateError::path_not_found(path.clone()))?;
    *target = value;
    Ok(())
}
