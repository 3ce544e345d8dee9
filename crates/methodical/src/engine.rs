//! State transitions.
//!
//! `TransitionEngine` turns `(current, name, args)` into the next state. It
//! is pure with respect to the store: it never commits and never notifies.
//!
//! # Steps
//!
//! 1. Resolve `name` in the methods registry.
//! 2. Open a [`Draft`] over `current`, plus a [`Query`] over the same
//!    pre-transition snapshot.
//! 3. Run the operation. On error the draft is dropped and nothing escapes.
//! 4. Pick the next state: the replacement value, or the edited draft.
//! 5. If a patch listener is attached, diff `current` against the next state
//!    and call the listener once.

use crate::args::Args;
use crate::error::{StoreError, StoreResult};
use crate::methods::{Methods, Outcome};
use crate::query::{Queries, Query};
use methodical_state::{Draft, Draftable, Patch};
use std::rc::Rc;

/// Observer of `(patches, inverse)` for every successful transition.
pub type PatchListener = Box<dyn Fn(&Patch, &Patch)>;

pub struct TransitionEngine<S> {
    methods: Rc<Methods<S>>,
    queries: Option<Rc<Queries<S>>>,
    patch_listener: Option<PatchListener>,
}

impl<S: Draftable> TransitionEngine<S> {
    pub fn new(methods: Rc<Methods<S>>) -> Self {
        Self {
            methods,
            queries: None,
            patch_listener: None,
        }
    }

    #[must_use]
    pub fn with_queries(mut self, queries: Rc<Queries<S>>) -> Self {
        self.queries = Some(queries);
        self
    }

    #[must_use]
    pub fn with_patch_listener(mut self, listener: impl Fn(&Patch, &Patch) + 'static) -> Self {
        self.patch_listener = Some(Box::new(listener));
        self
    }

    pub fn methods(&self) -> &Rc<Methods<S>> {
        &self.methods
    }

    pub fn queries(&self) -> Option<&Rc<Queries<S>>> {
        self.queries.as_ref()
    }

    /// Compute the state that follows `current` after operation `name`.
    pub fn transition(&self, current: &S, name: &str, args: &Args) -> StoreResult<S> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;

        let query = Query::new(current, self.queries.as_deref());
        let mut draft = Draft::new(current);
        let outcome =
            method(&mut draft, args, &query).map_err(|source| StoreError::OperationFailure {
                name: name.to_owned(),
                source,
            })?;

        let next = match outcome {
            Outcome::Replace(next) => next,
            Outcome::Mutated => {
                if draft.is_modified() && !current.supports_in_place() {
                    return Err(StoreError::ScalarMutation {
                        name: name.to_owned(),
                    });
                }
                draft.into_inner()
            }
        };

        if let Some(listener) = &self.patch_listener {
            let changes = S::diff(current, &next)?;
            tracing::trace!(
                operation = name,
                patches = changes.patches.len(),
                "computed transition patches"
            );
            listener(&changes.patches, &changes.inverse);
        }

        Ok(next)
    }
}

impl<S> std::fmt::Debug for TransitionEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("methods", &self.methods)
            .field("queries", &self.queries)
            .field("patch_listener", &self.patch_listener.is_some())
            .finish()
    }
}
