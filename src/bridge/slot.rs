//! Replaceable callback slots owned by a foreign component.
//!
//! A `CallbackSlot` is a single shared mutable cell holding the callback an
//! entry point currently runs. Every read and write goes through one lock,
//! and `compare_and_set` lets the bridge swap only when the slot still holds
//! what it last observed.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::BridgeError;

/// Invocation of a gated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Who asked (operator console, player name, ...)
    pub source: String,
    /// Free-text audit comment passed to the action
    pub comment: Option<String>,
    /// Proceed even if machines are not verifiably off
    pub override_requested: bool,
}

impl ActionRequest {
    pub fn new(source: impl Into<String>) -> Self {
        ActionRequest { source: source.into(), comment: None, override_requested: false }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn forced(mut self) -> Self {
        self.override_requested = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed(String),
    /// The gate blocked the action; these checkpoints are not verifiably off
    Refused { offenders: Vec<String> },
    Failed(String),
}

impl ActionOutcome {
    pub fn render(&self) -> Vec<String> {
        match self {
            ActionOutcome::Completed(msg) => vec![msg.clone()],
            ActionOutcome::Refused { offenders } => vec![
                format!("Machines not verifiably off: {}", offenders.join(", ")),
                "Turn them off and try again, or use `ignore` to force the backup".to_string(),
            ],
            ActionOutcome::Failed(msg) => vec![format!("Action failed: {}", msg)],
        }
    }
}

pub type ActionCallback = Arc<dyn Fn(ActionRequest) -> ActionOutcome + Send + Sync>;

/// Identity of two callbacks (same allocation), ignoring vtable pointers.
pub fn same_callback(a: &ActionCallback, b: &ActionCallback) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub struct CallbackSlot {
    name: String,
    current: Mutex<ActionCallback>,
}

impl CallbackSlot {
    pub fn new(name: impl Into<String>, callback: ActionCallback) -> Arc<Self> {
        Arc::new(CallbackSlot { name: name.into(), current: Mutex::new(callback) })
    }

    fn lock(&self) -> MutexGuard<'_, ActionCallback> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> ActionCallback {
        Arc::clone(&self.lock())
    }

    /// Install `callback`, returning the one it replaced.
    pub fn set(&self, callback: ActionCallback) -> ActionCallback {
        std::mem::replace(&mut *self.lock(), callback)
    }

    /// Install `callback` only if `expected` is still installed.
    pub fn compare_and_set(&self, expected: &ActionCallback, callback: ActionCallback) -> bool {
        let mut current = self.lock();
        if same_callback(&current, expected) {
            *current = callback;
            true
        } else {
            false
        }
    }

    /// Run whatever is currently installed. The lock is not held during the call.
    pub fn invoke(&self, request: ActionRequest) -> ActionOutcome {
        let callback = self.get();
        callback(request)
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Lookup of a foreign component's entry points by name.
pub trait EntryPointRegistry: Send + Sync {
    /// # Errors
    /// `ForeignComponentUnavailable` if the entry point is not registered.
    fn entry_point(&self, name: &str) -> Result<Arc<CallbackSlot>, BridgeError>;
}
