//! In-process stand-in for the foreign backup component.
//!
//! `CommandRegistry` owns one `CallbackSlot` per registered command. A repeat
//! registration installs a fresh slot, which is what a reload of the owning
//! component looks like from the outside: any wrapper on the old slot is gone.

pub mod backup;

pub use backup::ShellBackupAction;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::bridge::{ActionCallback, ActionOutcome, ActionRequest, CallbackSlot, EntryPointRegistry};
use crate::error::BridgeError;

#[derive(Default)]
pub struct CommandRegistry {
    slots: RwLock<HashMap<String, Arc<CallbackSlot>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing any previous slot.
    pub fn register(&self, name: &str, callback: ActionCallback) -> Arc<CallbackSlot> {
        let slot = CallbackSlot::new(name, callback);
        let previous = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), Arc::clone(&slot));
        if previous.is_some() {
            log::info!("[Host] Command '{}' re-registered", name);
        } else {
            log::debug!("[Host] Command '{}' registered", name);
        }
        slot
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
            .is_some();
        if removed {
            log::info!("[Host] Command '{}' unregistered", name);
        }
        removed
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.slots
            .read()
            .map(|slots| slots.contains_key(name))
            .unwrap_or(false)
    }

    /// Run whatever callback `name` currently holds.
    pub fn dispatch(&self, name: &str, request: ActionRequest) -> Result<ActionOutcome, BridgeError> {
        let slot = self.entry_point(name)?;
        Ok(slot.invoke(request))
    }
}

impl EntryPointRegistry for CommandRegistry {
    fn entry_point(&self, name: &str) -> Result<Arc<CallbackSlot>, BridgeError> {
        self.slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::ForeignComponentUnavailable(format!("no command named '{}'", name)))
    }
}
