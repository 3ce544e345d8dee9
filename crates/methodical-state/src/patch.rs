//! Ordered operation lists.
//!
//! A `Patch` runs front to back. A `PatchSet` is what one transition hands
//! its patch listener: the forward ops and the ops that undo them.

use crate::Op;
use serde::{Deserialize, Serialize};

/// Operations applied in order. Serializes as a plain JSON array.
///
/// ```
/// use methodical_state::{path, Op, Patch};
///
/// let patch = Patch::new()
///     .with_op(Op::replace(path!("count"), 1))
///     .with_op(Op::remove(path!("draft")));
/// assert_eq!(patch.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<Op>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_op(mut self, op: Op) -> Self {
        self.0.push(op);
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.0.iter()
    }
}

impl FromIterator<Op> for Patch {
    fn from_iter<I: IntoIterator<Item = Op>>(iter: I) -> Self {
        Patch(iter.into_iter().collect())
    }
}

impl IntoIterator for Patch {
    type Item = Op;
    type IntoIter = std::vec::IntoIter<Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The changes of one transition and their inverse.
///
/// `apply(prev, patches) == next` and `apply(next, inverse) == prev`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    pub patches: Patch,
    pub inverse: Patch,
}

impl PatchSet {
    /// True when the transition changed nothing.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Append a change and the op that undoes it.
    pub(crate) fn record(&mut self, forward: Op, backward: Op) {
        self.patches.0.push(forward);
        self.inverse.0.push(backward);
    }

    /// Put the recorded undo ops in the order that reverts the changes:
    /// last change first.
    pub(crate) fn seal(mut self) -> Self {
        self.inverse.0.reverse();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_wire_form_is_plain_list() {
        let patch = Patch::new().with_op(Op::remove(path!("a")));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "remove", "path": ["a"]}])
        );
    }

    #[test]
    fn test_sealed_inverse_runs_last_change_first() {
        let mut changes = PatchSet::default();
        changes.record(Op::add(path!("a"), 1), Op::remove(path!("a")));
        changes.record(Op::add(path!("b"), 2), Op::remove(path!("b")));
        let changes = changes.seal();

        assert_eq!(changes.patches.ops()[0].path(), &path!("a"));
        assert_eq!(changes.inverse.ops()[0].path(), &path!("b"));
        assert_eq!(changes.inverse.ops()[1].path(), &path!("a"));
    }
}
