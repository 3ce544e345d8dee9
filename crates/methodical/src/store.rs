//! The store facade: one owned state, its operations, queries and listeners.
//!
//! ```text
//! action.invoke(args)
//!   -> Core::dispatch          rejects re-entry while a transition runs
//!   -> TransitionEngine        draft, operation, optional patch listener
//!   -> commit                  previous = current, current = next
//!   -> Hub::notify             listeners re-read through get_state()
//! ```
//!
//! Transitions commit in invocation order and each commit notifies before
//! the call returns. A failed transition commits nothing and notifies no one.

use crate::args::Args;
use crate::binder::{ActionBinder, Actions, Dispatch};
use crate::config::{ListenerFailurePolicy, StoreConfig};
use crate::engine::{PatchListener, TransitionEngine};
use crate::error::{StoreError, StoreResult};
use crate::hub::{Hub, Subscription};
use crate::methods::Methods;
use crate::query::{BoundQueries, Queries, QueryProjector};
use methodical_state::{Draftable, Patch};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// The committed state and the value it replaced.
#[derive(Debug)]
pub struct StateSnapshot<S> {
    pub previous: Rc<S>,
    pub current: Rc<S>,
}

impl<S> Clone for StateSnapshot<S> {
    fn clone(&self) -> Self {
        Self {
            previous: Rc::clone(&self.previous),
            current: Rc::clone(&self.current),
        }
    }
}

struct Core<S> {
    engine: TransitionEngine<S>,
    cell: Rc<RefCell<StateSnapshot<S>>>,
    hub: Hub,
    active: RefCell<Option<String>>,
    label: Option<String>,
}

/// Marks a transition as running; cleared on drop, including on unwind.
struct ActiveGuard<'a> {
    slot: &'a RefCell<Option<String>>,
}

impl<'a> ActiveGuard<'a> {
    fn enter(slot: &'a RefCell<Option<String>>, name: &str) -> Self {
        *slot.borrow_mut() = Some(name.to_owned());
        Self { slot }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.slot.borrow_mut() = None;
    }
}

impl<S: Draftable> Core<S> {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("store")
    }
}

impl<S: Draftable> Dispatch for Core<S> {
    fn dispatch(&self, name: &str, args: Args) -> StoreResult<()> {
        if let Some(active) = self.active.borrow().as_deref() {
            tracing::warn!(
                store = self.label(),
                operation = name,
                active,
                "rejected re-entrant dispatch"
            );
            return Err(StoreError::Reentrant {
                name: name.to_owned(),
                active: active.to_owned(),
            });
        }

        let current = Rc::clone(&self.cell.borrow().current);
        let next = {
            let _guard = ActiveGuard::enter(&self.active, name);
            self.engine.transition(&current, name, &args)
        };
        let next = match next {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(
                    store = self.label(),
                    operation = name,
                    error = %err,
                    "transition rejected"
                );
                return Err(err);
            }
        };

        {
            let mut snapshot = self.cell.borrow_mut();
            snapshot.previous = std::mem::replace(&mut snapshot.current, Rc::new(next));
        }
        tracing::debug!(
            store = self.label(),
            operation = name,
            "committed transition"
        );

        self.hub.notify();
        Ok(())
    }
}

/// A single owned state value with named operations over it.
///
/// Everything handed out by a store (actions, bound queries, subscriptions)
/// is single-threaded and cheap to clone.
pub struct Store<S> {
    core: Rc<Core<S>>,
    target: Weak<dyn Dispatch>,
    binder: ActionBinder<S>,
    queries: BoundQueries<S>,
}

impl<S: Draftable + 'static> Store<S> {
    pub fn new(methods: impl Into<Rc<Methods<S>>>, initial: S) -> Self {
        Self::builder(methods, initial).build()
    }

    pub fn builder(methods: impl Into<Rc<Methods<S>>>, initial: S) -> StoreBuilder<S> {
        StoreBuilder {
            methods: methods.into(),
            initial,
            queries: None,
            patch_listener: None,
            config: StoreConfig::default(),
        }
    }

    /// The current state and the one it replaced.
    pub fn get_state(&self) -> StateSnapshot<S> {
        self.core.cell.borrow().clone()
    }

    pub fn current(&self) -> Rc<S> {
        Rc::clone(&self.core.cell.borrow().current)
    }

    pub fn previous(&self) -> Rc<S> {
        Rc::clone(&self.core.cell.borrow().previous)
    }

    /// Register a listener called after every committed transition.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        self.core.hub.subscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.core.hub.len()
    }

    /// One callable per operation.
    pub fn actions(&self) -> Actions {
        self.binder.bind(self.core.engine.methods(), &self.target)
    }

    /// One callable per query, always reading the latest committed state.
    pub fn query(&self) -> BoundQueries<S> {
        self.queries.clone()
    }

    /// Run operation `name` and notify listeners.
    pub fn dispatch(&self, name: &str, args: Args) -> StoreResult<()> {
        self.core.dispatch(name, args)
    }

    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.core.label)
            .field("engine", &self.core.engine)
            .field("hub", &self.core.hub)
            .finish_non_exhaustive()
    }
}

pub struct StoreBuilder<S> {
    methods: Rc<Methods<S>>,
    initial: S,
    queries: Option<Rc<Queries<S>>>,
    patch_listener: Option<PatchListener>,
    config: StoreConfig,
}

impl<S: Draftable + 'static> StoreBuilder<S> {
    #[must_use]
    pub fn queries(mut self, queries: impl Into<Rc<Queries<S>>>) -> Self {
        self.queries = Some(queries.into());
        self
    }

    /// Observe `(patches, inverse)` for every committed transition.
    #[must_use]
    pub fn patch_listener(mut self, listener: impl Fn(&Patch, &Patch) + 'static) -> Self {
        self.patch_listener = Some(Box::new(listener));
        self
    }

    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn listener_failure(mut self, policy: ListenerFailurePolicy) -> Self {
        self.config.listener_failure = policy;
        self
    }

    pub fn build(self) -> Store<S> {
        let queries = self.queries.unwrap_or_else(|| Rc::new(Queries::empty()));

        let mut engine = TransitionEngine::new(self.methods).with_queries(Rc::clone(&queries));
        if let Some(listener) = self.patch_listener {
            engine = engine.with_patch_listener(listener);
        }

        let initial = Rc::new(self.initial);
        let cell = Rc::new(RefCell::new(StateSnapshot {
            previous: Rc::clone(&initial),
            current: initial,
        }));

        let supplier = Rc::clone(&cell);
        let bound = QueryProjector::project(queries, move || Rc::clone(&supplier.borrow().current));

        let core = Rc::new(Core {
            engine,
            cell,
            hub: Hub::with_policy(self.config.listener_failure),
            active: RefCell::new(None),
            label: self.config.label,
        });
        let dispatcher: Rc<dyn Dispatch> = core.clone();
        let target = Rc::downgrade(&dispatcher);

        tracing::debug!(
            store = core.label(),
            operations = core.engine.methods().len(),
            "store created"
        );

        Store {
            core,
            target,
            binder: ActionBinder::new(),
            queries: bound,
        }
    }
}
