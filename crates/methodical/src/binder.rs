//! Callable actions derived from a methods registry.
//!
//! The binder only reads operation names; it never calls an operation. Each
//! [`Action`] holds a weak handle to whatever performs the dispatch, so
//! actions can be captured freely by listeners and UI callbacks without
//! keeping the store alive.

use crate::args::Args;
use crate::error::{StoreError, StoreResult};
use crate::methods::Methods;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Something that runs one named transition and its notification.
pub trait Dispatch {
    fn dispatch(&self, name: &str, args: Args) -> StoreResult<()>;
}

/// One operation, bound to a dispatcher.
#[derive(Clone)]
pub struct Action {
    name: Rc<str>,
    target: Weak<dyn Dispatch>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the operation. Fails with [`StoreError::Disposed`] once the
    /// dispatcher has been dropped.
    pub fn invoke(&self, args: Args) -> StoreResult<()> {
        let target = self.target.upgrade().ok_or(StoreError::Disposed)?;
        target.dispatch(&self.name, args)
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

#[derive(Default)]
struct ActionTable {
    order: Vec<Action>,
    index: HashMap<Rc<str>, usize>,
}

/// The full set of bound actions, one per operation name.
#[derive(Clone, Default)]
pub struct Actions {
    table: Rc<ActionTable>,
}

impl Actions {
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.table.index.get(name).map(|&i| &self.table.order[i])
    }

    /// Invoke the action named `name`.
    pub fn call(&self, name: &str, args: Args) -> StoreResult<()> {
        self.get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?
            .invoke(args)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.order.iter().map(Action::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.table.order.iter()
    }

    pub fn len(&self) -> usize {
        self.table.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.order.is_empty()
    }

    /// True when both handles share the same bound table.
    pub fn ptr_eq(&self, other: &Actions) -> bool {
        Rc::ptr_eq(&self.table, &other.table)
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Derives [`Actions`] from a methods registry, rebinding only when the
/// registry handed in is a different allocation from the last one.
pub struct ActionBinder<S> {
    memo: RefCell<Option<(Rc<Methods<S>>, Actions)>>,
}

impl<S> ActionBinder<S> {
    pub fn new() -> Self {
        Self {
            memo: RefCell::new(None),
        }
    }

    pub fn bind(&self, methods: &Rc<Methods<S>>, target: &Weak<dyn Dispatch>) -> Actions {
        if let Some((bound_to, actions)) = self.memo.borrow().as_ref() {
            if Rc::ptr_eq(bound_to, methods) {
                return actions.clone();
            }
        }

        let mut table = ActionTable::default();
        for name in methods.names() {
            let name: Rc<str> = Rc::from(name);
            table.index.insert(Rc::clone(&name), table.order.len());
            table.order.push(Action {
                name,
                target: Weak::clone(target),
            });
        }
        let actions = Actions {
            table: Rc::new(table),
        };
        *self.memo.borrow_mut() = Some((Rc::clone(methods), actions.clone()));
        actions
    }
}

impl<S> Default for ActionBinder<S> {
    fn default() -> Self {
        Self::new()
    }
}
