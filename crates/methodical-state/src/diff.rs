//! Structural diff between two versions of a tree.
//!
//! Reference-identical subtrees are skipped without being walked, so the cost
//! of diffing the result of a copy-on-write edit is proportional to the
//! copied path, not to the size of the tree.

use crate::{Node, Op, PatchSet, Path, Seg, StateResult};
use serde::Serialize;

/// Compute the changes from `prev` to `next` together with their inverse.
///
/// # Examples
///
/// ```
/// use methodical_state::{apply_patch, diff, Node};
/// use serde_json::json;
///
/// let prev = Node::from(json!({"count": 1, "tags": ["a"]}));
/// let next = Node::from(json!({"count": 2, "tags": ["a", "b"]}));
///
/// let changes = diff(&prev, &next);
/// assert_eq!(apply_patch(&prev, &changes.patches).unwrap(), next);
/// assert_eq!(apply_patch(&next, &changes.inverse).unwrap(), prev);
/// ```
pub fn diff(prev: &Node, next: &Node) -> PatchSet {
    let mut changes = PatchSet::default();
    walk(prev, next, &mut Path::root(), &mut changes);
    changes.seal()
}

/// Diff two serializable values through their tree form.
///
/// Values are encoded straight into [`Node`], so states that have no JSON
/// form still diff: non-finite floats become the strings `"NaN"`, `"inf"`
/// and `"-inf"`, and non-string map keys are rendered as text.
pub fn diff_serialized<T: Serialize + ?Sized>(prev: &T, next: &T) -> StateResult<PatchSet> {
    Ok(diff(&Node::from_serialize(prev)?, &Node::from_serialize(next)?))
}

fn walk(prev: &Node, next: &Node, at: &mut Path, changes: &mut PatchSet) {
    if prev.ptr_eq(next) {
        return;
    }
    match (prev, next) {
        (Node::Object(old), Node::Object(new)) => {
            for (key, before) in old.iter() {
                match new.get(key) {
                    Some(after) => {
                        at.push(Seg::Key(key.clone()));
                        walk(before, after, at, changes);
                        at.pop();
                    }
                    None => {
                        let gone = at.child(key.as_str());
                        changes.record(Op::remove(gone.clone()), Op::add(gone, before.clone()));
                    }
                }
            }
            for (key, after) in new.iter().filter(|(key, _)| !old.contains_key(*key)) {
                let added = at.child(key.as_str());
                changes.record(Op::add(added.clone(), after.clone()), Op::remove(added));
            }
        }
        (Node::Array(old), Node::Array(new)) => {
            let common = old.len().min(new.len());
            for (index, (before, after)) in old.iter().zip(new.iter()).enumerate() {
                at.push(Seg::Index(index));
                walk(before, after, at, changes);
                at.pop();
            }
            for (index, after) in new.iter().enumerate().skip(common) {
                let added = at.child(index);
                changes.record(Op::add(added.clone(), after.clone()), Op::remove(added));
            }
            // Trailing removals go highest index first so each path stays valid.
            for index in (common..old.len()).rev() {
                let gone = at.child(index);
                changes.record(Op::remove(gone.clone()), Op::add(gone, old[index].clone()));
            }
        }
        _ if prev != next => changes.record(
            Op::replace(at.clone(), next.clone()),
            Op::replace(at.clone(), prev.clone()),
        ),
        _ => {}
    }
}
