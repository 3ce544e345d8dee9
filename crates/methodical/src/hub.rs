//! Change notification.
//!
//! `Hub` keeps an ordered list of zero-argument listeners. It is the only
//! link between a store and whatever re-renders from it: a host registers
//! one listener that schedules its own refresh and reads the state back
//! through `Store::get_state`.
//!
//! # Invariants
//!
//! 1. Listeners run in subscription order, synchronously, on the caller.
//! 2. A listener subscribed during a pass is not invoked in that pass.
//! 3. A listener unsubscribed during a pass, before it was reached, is
//!    skipped; no other listener is skipped or invoked twice.
//! 4. Unsubscribing twice, or after the hub is gone, is a no-op.

use crate::config::ListenerFailurePolicy;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type Listener = Rc<dyn Fn()>;

/// One registered listener. `live` is shared with its [`Subscription`] and
/// drops to `false` on unsubscribe, so a pass in progress skips it without
/// searching the registry.
#[derive(Clone)]
struct Entry {
    id: u64,
    live: Rc<Cell<bool>>,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
}

impl Registry {
    fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|entry| entry.id != id);
    }
}

/// Outcome of one notification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Listeners that were called.
    pub invoked: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// Ordered publish/subscribe registry.
#[derive(Clone, Default)]
pub struct Hub {
    registry: Rc<Registry>,
    policy: ListenerFailurePolicy,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ListenerFailurePolicy) -> Self {
        Self {
            registry: Rc::default(),
            policy,
        }
    }

    /// Append a listener. Each call registers a distinct entry, even for a
    /// listener that is already subscribed.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);
        let live = Rc::new(Cell::new(true));
        self.registry.entries.borrow_mut().push(Entry {
            id,
            live: Rc::clone(&live),
            listener: Rc::new(listener),
        });
        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
            live,
        }
    }

    /// Invoke every subscribed listener once, in subscription order.
    pub fn notify(&self) -> NotifyReport {
        let pass: Vec<Entry> = self.registry.entries.borrow().clone();
        let mut report = NotifyReport::default();

        for entry in pass {
            if !entry.live.get() {
                continue;
            }
            report.invoked += 1;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (entry.listener)())) {
                report.failed += 1;
                tracing::error!(
                    listener = entry.id,
                    panic = %panic_message(payload.as_ref()),
                    "store listener panicked"
                );
                if self.policy == ListenerFailurePolicy::Propagate {
                    panic::resume_unwind(payload);
                }
            }
        }

        tracing::trace!(
            invoked = report.invoked,
            failed = report.failed,
            "notified listeners"
        );
        report
    }

    pub fn len(&self) -> usize {
        self.registry.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("listeners", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Membership of one listener in a [`Hub`].
///
/// Dropping a `Subscription` does not unsubscribe; call
/// [`Subscription::unsubscribe`].
#[derive(Clone, Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
    live: Rc<Cell<bool>>,
}

impl Subscription {
    /// Remove this listener. Idempotent; clones of a subscription share it.
    pub fn unsubscribe(&self) {
        if !self.live.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// True while the listener is registered with a hub that still exists.
    pub fn is_active(&self) -> bool {
        self.live.get() && self.registry.strong_count() > 0
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
