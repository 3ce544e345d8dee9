//! A single owned state value, changed only through named operations.
//!
//! A [`Store`] is built from a [`Methods`] registry and an initial state. It
//! hands out:
//!
//! - [`Store::get_state`]: the current state and the one it replaced,
//! - [`Store::actions`]: one callable per operation,
//! - [`Store::query`]: read-only queries that always see the latest state,
//! - [`Store::subscribe`]: listeners called after every committed change.
//!
//! Operations edit a copy-on-write [`Draft`]; untouched branches of the
//! state stay shared by reference between the previous and current value.
//!
//! # Quick Start
//!
//! ```
//! use methodical::{args, impl_draftable_via_serde, Methods, Outcome, Queries, Store};
//! use serde::Serialize;
//!
//! #[derive(Clone, Debug, PartialEq, Serialize)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl_draftable_via_serde!(Counter);
//!
//! let methods = Methods::<Counter>::builder()
//!     .method("increment", |draft, args| {
//!         draft.count += args.get::<i64>(0)?;
//!         Ok(Outcome::Mutated)
//!     })
//!     .build()
//!     .unwrap();
//! let queries = Queries::<Counter>::builder()
//!     .query("get_count", |state, _| Ok(state.count))
//!     .build()
//!     .unwrap();
//!
//! let store = Store::builder(methods, Counter { count: 0 })
//!     .queries(queries)
//!     .build();
//!
//! let actions = store.actions();
//! actions.call("increment", args![5]).unwrap();
//! actions.call("increment", args![3]).unwrap();
//!
//! let state = store.get_state();
//! assert_eq!(state.current.count, 8);
//! assert_eq!(state.previous.count, 5);
//! assert_eq!(store.query().call_as::<i64>("get_count", args![]).unwrap(), 8);
//! ```

mod args;
mod binder;
mod config;
mod engine;
mod error;
mod hub;
mod methods;
mod query;
mod store;

pub use args::{Args, ArgsError};
pub use binder::{Action, ActionBinder, Actions, Dispatch};
pub use config::{ListenerFailurePolicy, StoreConfig};
pub use engine::{PatchListener, TransitionEngine};
pub use error::{OperationError, StoreError, StoreResult};
pub use hub::{Hub, NotifyReport, Subscription};
pub use methods::{MethodResult, Methods, MethodsBuilder, Outcome};
pub use query::{
    BoundQueries, Queries, QueriesBuilder, Query, QueryProjector, QueryResult, QueryValue,
};
pub use store::{StateSnapshot, Store, StoreBuilder};

pub use methodical_state::{
    impl_draftable_via_serde, path, Draft, Draftable, Node, Op, Patch, PatchSet, Path,
};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
