//! Error Types
//!
//! Every fallible operation in the engine reports one of the enums below.
//! Recovery is always local: a failing subscriber, effect, or component body
//! is isolated at the nearest boundary and never unwinds into unrelated
//! subtrees.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Errors returned by observable cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// The cell was destroyed and no longer accepts subscribers.
    #[error("cell has been destroyed")]
    Destroyed,

    /// The cell already carries the maximum number of subscribers.
    #[error("subscriber limit of {limit} reached")]
    SubscriberLimit { limit: usize },
}

/// Hook protocol violations.
///
/// These are programmer errors: a hook was called with no component
/// rendering, or the hooks of an instance were called in a different order
/// or count than on its previous render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("`{hook}` called outside an active component")]
    OutsideComponent { hook: &'static str },

    #[error("hook slot {index} holds a different hook than `{hook}` (hook order changed between renders)")]
    SlotMismatch { index: usize, hook: &'static str },

    #[error("component `{component}` called {found} hooks but rendered with {expected} before")]
    SlotCountChanged {
        component: &'static str,
        expected: usize,
        found: usize,
    },
}

/// A failure while rendering a component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The component misused the hook protocol.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The component body (or its deferred result) reported an error.
    #[error("{0}")]
    Failed(String),

    /// The component body panicked.
    #[error("component `{component}` panicked: {message}")]
    Panicked {
        component: &'static str,
        message: String,
    },
}

impl RenderError {
    /// Build a render error from any displayable message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }

    /// Whether this error is a hook protocol violation.
    pub fn is_hook_violation(&self) -> bool {
        matches!(self, Self::Hook(_))
    }
}

/// Errors while loading a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Run user code, converting a panic into an error message.
///
/// Subscriber callbacks, effects, cleanups, event handlers, and component
/// bodies all run through here so one faulty callback cannot take down the
/// notification pass or render that invoked it.
pub(crate) fn isolate<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
