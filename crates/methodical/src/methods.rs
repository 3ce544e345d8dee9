//! Operation definitions.
//!
//! A [`Methods`] registry maps operation names to functions over a draft of
//! the state. Names are declared at registration time, independently of any
//! state value, and are fixed once the registry is built.

use crate::args::Args;
use crate::error::{OperationError, StoreError, StoreResult};
use crate::query::Query;
use methodical_state::Draft;
use std::collections::HashMap;

/// What an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<S> {
    /// The draft, with its in-place edits, becomes the next state.
    Mutated,
    /// This value becomes the next state; draft edits are discarded.
    Replace(S),
}

pub type MethodResult<S> = Result<Outcome<S>, OperationError>;

pub(crate) type MethodFn<S> =
    Box<dyn Fn(&mut Draft<'_, S>, &Args, &Query<'_, S>) -> MethodResult<S>>;

/// Named operations over a state `S`.
///
/// ```
/// use methodical::{Methods, Outcome};
///
/// let methods = Methods::<i64>::builder()
///     .method("add", |draft, args| Ok(Outcome::Replace(**draft + args.get::<i64>(0)?)))
///     .method("reset", |_, _| Ok(Outcome::Replace(0)))
///     .build()
///     .unwrap();
///
/// assert_eq!(methods.names().collect::<Vec<_>>(), ["add", "reset"]);
/// ```
pub struct Methods<S> {
    entries: Vec<(String, MethodFn<S>)>,
    index: HashMap<String, usize>,
}

impl<S: 'static> Methods<S> {
    pub fn builder() -> MethodsBuilder<S> {
        MethodsBuilder {
            entries: Vec::new(),
        }
    }
}

impl<S> Methods<S> {
    /// Operation names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&MethodFn<S>> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }
}

impl<S> std::fmt::Debug for Methods<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Collects operations; duplicates are reported by [`MethodsBuilder::build`].
pub struct MethodsBuilder<S> {
    entries: Vec<(String, MethodFn<S>)>,
}

impl<S: 'static> MethodsBuilder<S> {
    /// Register an operation that only needs the draft and its arguments.
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Draft<'_, S>, &Args) -> MethodResult<S> + 'static,
    {
        self.entries.push((
            name.into(),
            Box::new(move |draft: &mut Draft<'_, S>, args: &Args, _: &Query<'_, S>| {
                f(draft, args)
            }),
        ));
        self
    }

    /// Register an operation that also reads queries. The queries see the
    /// state as it was before this transition, regardless of draft edits.
    #[must_use]
    pub fn method_with_query<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Draft<'_, S>, &Args, &Query<'_, S>) -> MethodResult<S> + 'static,
    {
        self.entries.push((name.into(), Box::new(f)));
        self
    }

    pub fn build(self) -> StoreResult<Methods<S>> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (i, (name, _)) in self.entries.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(StoreError::DuplicateName {
                    kind: "method",
                    name: name.clone(),
                });
            }
        }
        Ok(Methods {
            entries: self.entries,
            index,
        })
    }
}
