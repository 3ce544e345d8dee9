//! Persistent state trees, copy-on-write drafts and structural patches.
//!
//! `methodical-state` is the document layer underneath the `methodical`
//! store. It knows nothing about operations, listeners or queries; it only
//! answers three questions about a state value:
//!
//! - how to edit it without disturbing the committed version ([`Draft`]),
//! - which parts of it changed ([`diff`], [`PatchSet`]),
//! - how to replay or revert those changes ([`apply_patch`]).
//!
//! # Structural sharing
//!
//! ```text
//! next = edit(clone(prev))      clone is O(1), edit copies one root-to-leaf path
//! diff(prev, next)              skips every subtree shared by reference
//! apply(next, inverse) == prev
//! ```
//!
//! # Quick Start
//!
//! ```
//! use methodical_state::{diff, path, Draft, Node};
//! use serde_json::json;
//!
//! let prev = Node::from(json!({"todos": [{"done": false}], "filter": "all"}));
//!
//! let mut draft = Draft::new(&prev);
//! draft.set(&path!("todos", 0, "done"), true).unwrap();
//! let next = draft.into_inner();
//!
//! assert!(next["filter"].ptr_eq(&prev["filter"]));
//! assert_eq!(diff(&prev, &next).patches.len(), 1);
//! ```

mod apply;
mod diff;
mod draft;
mod error;
mod node;
mod op;
mod patch;
mod path;
mod ser;

pub use apply::{apply_patch, apply_patches};
pub use diff::{diff, diff_serialized};
pub use draft::{Draft, Draftable};
pub use error::{value_type_name, StateError, StateResult};
pub use node::{Amount, Map, Node};
pub use op::Op;
pub use patch::{Patch, PatchSet};
pub use path::{Path, Seg};
