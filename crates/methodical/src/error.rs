//! Error types for the store runtime.

use crate::args::ArgsError;
use methodical_state::StateError;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by dispatch, queries and registry construction.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An action was invoked under a name the methods registry does not know.
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },

    /// The operation returned an error. Nothing was committed.
    #[error("operation '{name}' failed: {source}")]
    OperationFailure {
        name: String,
        #[source]
        source: OperationError,
    },

    /// The operation edited the draft of a state that only supports
    /// wholesale replacement, then returned without a replacement value.
    #[error("operation '{name}' edited a scalar state in place; return the next value instead")]
    ScalarMutation { name: String },

    /// An action was invoked while another operation of the same store was
    /// still computing its transition.
    #[error("operation '{name}' dispatched while '{active}' is transitioning")]
    Reentrant { name: String, active: String },

    /// The store behind a bound action has been dropped.
    #[error("store has been dropped")]
    Disposed,

    #[error("unknown query: {name}")]
    UnknownQuery { name: String },

    #[error("query '{name}' failed: {source}")]
    QueryFailure {
        name: String,
        #[source]
        source: OperationError,
    },

    /// Two methods or two queries were registered under the same name.
    #[error("{kind} already registered: {name}")]
    DuplicateName { kind: &'static str, name: String },

    /// Diffing the previous and next state for the patch listener failed.
    #[error("failed to compute patches: {0}")]
    Patch(#[from] StateError),

    /// `call_as` asked for a different type than the query returns.
    #[error("query '{name}' returns {found}, not {expected}")]
    QueryType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `call_json` on a query registered without a JSON view, or whose
    /// result JSON cannot represent (non-finite floats, non-string keys).
    #[error("query '{name}' result has no JSON form")]
    NoJsonForm {
        name: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl StoreError {
    pub(crate) fn unknown_operation(name: &str) -> Self {
        StoreError::UnknownOperation {
            name: name.to_owned(),
        }
    }

    pub(crate) fn unknown_query(name: &str) -> Self {
        StoreError::UnknownQuery {
            name: name.to_owned(),
        }
    }
}

/// Error returned by an operation or query implementation.
///
/// Carries a message plus the underlying error when there is one, so the
/// `?` operator works on state edits, argument decoding and nested queries
/// inside a method body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Downcast the underlying error, if any.
    pub fn source_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl From<StateError> for OperationError {
    fn from(err: StateError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<ArgsError> for OperationError {
    fn from(err: ArgsError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<StoreError> for OperationError {
    fn from(err: StoreError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}
