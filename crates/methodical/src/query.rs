//! Read-only derived queries and their projection onto live state.
//!
//! A [`Queries`] registry holds side-effect-free functions of `(&S, &Args)`.
//! It never stores a state value: the state is handed in per call, either by
//! a [`BoundQueries`] reading its supplier (the latest committed state) or
//! by a [`Query`] fixed to the snapshot an operation started from.
//!
//! Results keep their Rust type. `call_as::<T>` hands back exactly the value
//! the query returned; `call_json` is a separate, lossy view for hosts that
//! want JSON.

use crate::args::Args;
use crate::error::{OperationError, StoreError, StoreResult};
use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::rc::Rc;

pub type QueryResult = Result<QueryValue, OperationError>;

type QueryFn<S> = Box<dyn Fn(&S, &Args) -> QueryResult>;

type Encode = fn(&dyn Any) -> Option<serde_json::Result<Value>>;

fn encode_as<R: Serialize + 'static>(value: &dyn Any) -> Option<serde_json::Result<Value>> {
    value.downcast_ref::<R>().map(serde_json::to_value)
}

/// The result of one query call, with its concrete type erased.
pub struct QueryValue {
    value: Box<dyn Any>,
    type_name: &'static str,
    encode: Option<Encode>,
}

impl QueryValue {
    fn new<R: 'static>(value: R, encode: Option<Encode>) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<R>(),
            encode,
        }
    }

    /// Name of the type the query returned.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out as `T`, or get `self` back when it is another type.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let Self {
            value,
            type_name,
            encode,
        } = self;
        value.downcast::<T>().map(|value| *value).map_err(|value| Self {
            value,
            type_name,
            encode,
        })
    }

    /// JSON form of the value. `None` for queries registered without one.
    pub fn to_json(&self) -> Option<serde_json::Result<Value>> {
        self.encode.and_then(|encode| encode(&*self.value))
    }
}

impl std::fmt::Debug for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn downcast<T: 'static>(name: &str, value: QueryValue) -> StoreResult<T> {
    value
        .downcast::<T>()
        .map_err(|value| StoreError::QueryType {
            name: name.to_owned(),
            expected: type_name::<T>(),
            found: value.type_name(),
        })
}

fn encode(name: &str, value: &QueryValue) -> StoreResult<Value> {
    match value.to_json() {
        Some(Ok(json)) => Ok(json),
        Some(Err(source)) => Err(StoreError::NoJsonForm {
            name: name.to_owned(),
            source: Some(source),
        }),
        None => Err(StoreError::NoJsonForm {
            name: name.to_owned(),
            source: None,
        }),
    }
}

/// Named read-only queries over a state `S`.
pub struct Queries<S> {
    entries: Vec<(String, QueryFn<S>)>,
    index: HashMap<String, usize>,
}

impl<S: 'static> Queries<S> {
    pub fn builder() -> QueriesBuilder<S> {
        QueriesBuilder {
            entries: Vec::new(),
        }
    }

    /// A registry with no queries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<S> Queries<S> {
    /// Query names in registration order.
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

    /// Run query `name` against `state`.
    pub fn evaluate(&self, state: &S, name: &str, args: &Args) -> StoreResult<QueryValue> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| StoreError::unknown_query(name))?;
        (self.entries[i].1)(state, args).map_err(|source| StoreError::QueryFailure {
            name: name.to_owned(),
            source,
        })
    }
}

impl<S> std::fmt::Debug for Queries<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

pub struct QueriesBuilder<S> {
    entries: Vec<(String, QueryFn<S>)>,
}

impl<S: 'static> QueriesBuilder<S> {
    /// Register a query whose result also has a JSON view.
    #[must_use]
    pub fn query<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S, &Args) -> Result<R, OperationError> + 'static,
        R: Serialize + 'static,
    {
        self.register(name, f, Some(encode_as::<R> as Encode))
    }

    /// Register a query returning a type without a serde form. `call_json`
    /// fails for it with [`StoreError::NoJsonForm`].
    #[must_use]
    pub fn opaque_query<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S, &Args) -> Result<R, OperationError> + 'static,
        R: 'static,
    {
        self.register(name, f, None)
    }

    fn register<F, R>(mut self, name: impl Into<String>, f: F, encode: Option<Encode>) -> Self
    where
        F: Fn(&S, &Args) -> Result<R, OperationError> + 'static,
        R: 'static,
    {
        self.entries.push((
            name.into(),
            Box::new(move |state: &S, args: &Args| -> QueryResult {
                Ok(QueryValue::new(f(state, args)?, encode))
            }),
        ));
        self
    }

    pub fn build(self) -> StoreResult<Queries<S>> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (i, (name, _)) in self.entries.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(StoreError::DuplicateName {
                    kind: "query",
                    name: name.clone(),
                });
            }
        }
        Ok(Queries {
            entries: self.entries,
            index,
        })
    }
}

/// Queries fixed to one state snapshot, handed to operations.
pub struct Query<'a, S> {
    state: &'a S,
    queries: Option<&'a Queries<S>>,
}

impl<'a, S> Query<'a, S> {
    pub fn new(state: &'a S, queries: Option<&'a Queries<S>>) -> Self {
        Self { state, queries }
    }

    /// The snapshot these queries read.
    pub fn state(&self) -> &'a S {
        self.state
    }

    pub fn call(&self, name: &str, args: Args) -> StoreResult<QueryValue> {
        match self.queries {
            Some(queries) => queries.evaluate(self.state, name, &args),
            None => Err(StoreError::unknown_query(name)),
        }
    }

    /// Call `name` and take its result as `T`, the type the query returns.
    pub fn call_as<T: 'static>(&self, name: &str, args: Args) -> StoreResult<T> {
        downcast(name, self.call(name, args)?)
    }

    pub fn call_json(&self, name: &str, args: Args) -> StoreResult<Value> {
        encode(name, &self.call(name, args)?)
    }
}

/// Builds [`BoundQueries`] from a registry and a state supplier.
pub struct QueryProjector;

impl QueryProjector {
    /// Bind `queries` to `supplier`. The supplier is read on every call, so
    /// the returned callables never need rebuilding after a transition.
    pub fn project<S: 'static>(
        queries: Rc<Queries<S>>,
        supplier: impl Fn() -> Rc<S> + 'static,
    ) -> BoundQueries<S> {
        BoundQueries {
            queries,
            supplier: Rc::new(supplier),
        }
    }
}

/// Query callables that always read the latest committed state.
pub struct BoundQueries<S> {
    queries: Rc<Queries<S>>,
    supplier: Rc<dyn Fn() -> Rc<S>>,
}

impl<S> BoundQueries<S> {
    pub fn call(&self, name: &str, args: Args) -> StoreResult<QueryValue> {
        let state = (self.supplier)();
        self.queries.evaluate(&state, name, &args)
    }

    /// Call `name` and take its result as `T`, the type the query returns.
    pub fn call_as<T: 'static>(&self, name: &str, args: Args) -> StoreResult<T> {
        downcast(name, self.call(name, args)?)
    }

    pub fn call_json(&self, name: &str, args: Args) -> StoreResult<Value> {
        encode(name, &self.call(name, args)?)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains(name)
    }
}

impl<S> Clone for BoundQueries<S> {
    fn clone(&self) -> Self {
        Self {
            queries: Rc::clone(&self.queries),
            supplier: Rc::clone(&self.supplier),
        }
    }
}

impl<S> std::fmt::Debug for BoundQueries<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundQueries")
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}
