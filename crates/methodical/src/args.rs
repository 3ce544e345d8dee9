//! Positional call arguments.
//!
//! Actions and queries are addressed by name, so their arguments travel as a
//! list of JSON values and are decoded by the method body with
//! [`Args::get`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors decoding an argument.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("missing argument {index} (got {len})")]
    Missing { index: usize, len: usize },

    #[error("argument {index} has the wrong shape: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Arguments of one action or query call.
///
/// ```
/// use methodical::{args, Args};
///
/// let args: Args = args![5, "five"];
/// assert_eq!(args.get::<i64>(0).unwrap(), 5);
/// assert_eq!(args.get::<String>(1).unwrap(), "five");
/// assert!(args.get::<i64>(2).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    #[inline]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw value at `index`.
    #[inline]
    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Decode the argument at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgsError> {
        let value = self.0.get(index).ok_or(ArgsError::Missing {
            index,
            len: self.0.len(),
        })?;
        T::deserialize(value).map_err(|source| ArgsError::Invalid { index, source })
    }

    /// Decode an optional trailing argument; absent or `null` yields `default`.
    pub fn get_or<T: DeserializeOwned>(&self, index: usize, default: T) -> Result<T, ArgsError> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.get(index),
        }
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build [`Args`] from serializable expressions.
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::empty()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::Args::new(vec![$($crate::__private::serde_json::json!($arg)),+])
    };
}
