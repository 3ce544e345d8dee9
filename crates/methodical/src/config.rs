//! Store configuration.
//!
//! Everything here deserializes from a JSON object with every field
//! optional, so a host can keep store settings next to its own config.

use serde::{Deserialize, Serialize};

/// What a notification pass does when a listener panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerFailurePolicy {
    /// Log the panic and keep notifying the remaining listeners.
    #[default]
    Isolate,
    /// Log the panic, then resume it; later listeners are skipped.
    Propagate,
}

/// Store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name attached to the store's log events.
    pub label: Option<String>,
    pub listener_failure: ListenerFailurePolicy,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_listener_failure(mut self, policy: ListenerFailurePolicy) -> Self {
        self.listener_failure = policy;
        self
    }
}
