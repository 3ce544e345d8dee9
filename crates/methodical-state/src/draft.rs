//! Copy-on-write drafts and the `Draftable` capability.
//!
//! A `Draft` borrows the committed state and only clones it the first time it
//! is mutably dereferenced. For `Node` and for application states built from
//! `Arc` fields the clone is shallow, and the actual path copying happens in
//! `Arc::make_mut` as the edit walks down the tree.

use crate::{diff, diff_serialized, Node, PatchSet, StateResult};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A state type the transition machinery can draft, edit and diff.
pub trait Draftable: Clone {
    /// Whether an operation may edit this value in place and return nothing.
    ///
    /// Scalars answer `false`: operations over them must return the next
    /// value instead.
    fn supports_in_place(&self) -> bool {
        true
    }

    /// Structural changes from `prev` to `next`, plus their inverse.
    fn diff(prev: &Self, next: &Self) -> StateResult<PatchSet>;
}

/// Containers and `null` edit in place: writing a key under `null` turns it
/// into an object, so an empty tree can be built up by an operation. Other
/// scalar roots must be replaced.
impl Draftable for Node {
    fn supports_in_place(&self) -> bool {
        self.is_container() || self.is_null()
    }

    fn diff(prev: &Self, next: &Self) -> StateResult<PatchSet> {
        Ok(diff(prev, next))
    }
}

impl<T: Draftable> Draftable for Arc<T> {
    fn supports_in_place(&self) -> bool {
        T::supports_in_place(self)
    }

    fn diff(prev: &Self, next: &Self) -> StateResult<PatchSet> {
        if Arc::ptr_eq(prev, next) {
            return Ok(PatchSet::default());
        }
        T::diff(prev, next)
    }
}

macro_rules! draftable_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Draftable for $ty {
                fn supports_in_place(&self) -> bool {
                    false
                }

                fn diff(prev: &Self, next: &Self) -> StateResult<PatchSet> {
                    diff_serialized(prev, next)
                }
            }
        )*
    };
}

draftable_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, String);

/// Implement [`Draftable`] for application types through their serde form.
///
/// ```
/// use methodical_state::{impl_draftable_via_serde, Draftable};
/// use serde::Serialize;
///
/// #[derive(Clone, Serialize)]
/// struct Counter {
///     count: i64,
/// }
///
/// impl_draftable_via_serde!(Counter);
///
/// let changes = Counter::diff(&Counter { count: 0 }, &Counter { count: 1 }).unwrap();
/// assert_eq!(changes.patches.len(), 1);
/// ```
#[macro_export]
macro_rules! impl_draftable_via_serde {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Draftable for $ty {
                fn diff(prev: &Self, next: &Self) -> $crate::StateResult<$crate::PatchSet> {
                    $crate::diff_serialized(prev, next)
                }
            }
        )+
    };
}

/// A lazily copied, editable view of a committed state.
///
/// Reading goes to the base until the first write; the first `DerefMut`
/// clones the base and every later access goes to that copy.
pub struct Draft<'a, S> {
    base: &'a S,
    copy: Option<S>,
}

impl<'a, S: Clone> Draft<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self { base, copy: None }
    }

    /// The committed state this draft started from.
    #[inline]
    pub fn base(&self) -> &'a S {
        self.base
    }

    /// True once the draft has been mutably accessed.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.copy.is_some()
    }

    /// The edited copy, or `None` if the draft was never written.
    pub fn finish(self) -> Option<S> {
        self.copy
    }

    /// The edited copy, or a clone of the base.
    pub fn into_inner(self) -> S {
        match self.copy {
            Some(copy) => copy,
            None => self.base.clone(),
        }
    }
}

impl<S> Deref for Draft<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.copy.as_ref().unwrap_or(self.base)
    }
}

impl<S: Clone> DerefMut for Draft<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        let base = self.base;
        self.copy.get_or_insert_with(|| base.clone())
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Draft<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Draft")
            .field("modified", &self.copy.is_some())
            .field("value", &**self)
            .finish()
    }
}
