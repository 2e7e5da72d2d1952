//! Runtime Configuration
//!
//! Tunables for a [`Runtime`](crate::Runtime). Every field has a default, so
//! a partial JSON document is enough to override one knob.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum number of subscribers a single cell accepts.
pub const SUBSCRIBER_LIMIT: usize = 1000;

/// Configuration for a rendering runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Text shown in place of an asynchronous component until it settles.
    pub placeholder_text: String,

    /// Class attribute of the inline node that replaces a failed subtree.
    pub error_class: String,

    /// Delay of the coalescing window in milliseconds.
    ///
    /// Zero yields to the task queue once, which is enough to merge every
    /// write made in the same synchronous call stack.
    pub coalesce_delay_ms: u64,

    /// Fail a render when a component calls a different number of hooks
    /// than on its previous render.
    pub check_hook_order: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            placeholder_text: "Loading...".to_string(),
            error_class: "render-error".to_string(),
            coalesce_delay_ms: 0,
            check_hook_order: cfg!(debug_assertions),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
