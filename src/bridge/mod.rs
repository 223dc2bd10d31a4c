//! Takeover Bridge: keep a verification gate installed on a foreign entry point.
//!
//! The foreign component exposes no extension hook for its action, so the
//! bridge wraps the action's callback slot instead. A background thread
//! reconciles once per poll interval:
//!
//! ```text
//! Detached ──(entry point present, wrapper absent)──> Bound
//! Bound ──(wrapper replaced by a foreign reload)──> rebind with the new original
//! Bound ──(entry point lookup fails)──> Bound, retried next cycle
//! any ──shutdown──> original callback restored, Detached
//! ```
//!
//! A rebind is needed even when the new callback looks identical: the old
//! wrapper's captured original belongs to the unloaded instance.
//!
//! The slot only ever holds the foreign original or the bridge's wrapper;
//! swaps use compare-and-set so a concurrent foreign write is never clobbered.

pub mod gate;
pub mod slot;

pub use gate::{annotate_comment, ActionGate};
pub use slot::{same_callback, ActionCallback, ActionOutcome, ActionRequest, CallbackSlot, EntryPointRegistry};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::store::OverrideMode;
use crate::error::BridgeError;

/// Granularity of cancellable sleeps in the poll loop.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Detached,
    Bound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Reconcile until explicitly stopped
    Continuous,
    /// Stop reconciling after the window elapses (the binding stays installed)
    Bounded(Duration),
}

impl PollMode {
    pub fn from_override_mode(mode: OverrideMode, window: Duration) -> Self {
        match mode {
            OverrideMode::Thread => PollMode::Continuous,
            OverrideMode::Event => PollMode::Bounded(window),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub poll_interval: Duration,
    pub mode: PollMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig { poll_interval: Duration::from_millis(100), mode: PollMode::Continuous }
    }
}

/// The bridge's ownership record of the foreign slot.
struct Binding {
    slot: Arc<CallbackSlot>,
    original: ActionCallback,
    wrapper: ActionCallback,
}

struct BridgeCore {
    registry: Arc<dyn EntryPointRegistry>,
    entry_point: String,
    gate: Arc<ActionGate>,
    binding: Mutex<Option<Binding>>,
}

impl BridgeCore {
    fn lock_binding(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> BridgeState {
        if self.lock_binding().is_some() {
            BridgeState::Bound
        } else {
            BridgeState::Detached
        }
    }

    /// One reconciliation cycle.
    fn reconcile(&self) -> Result<BridgeState, BridgeError> {
        let mut binding = self.lock_binding();

        // The binding outlives a failed lookup: the slot may still hold our wrapper.
        let slot = self.registry.entry_point(&self.entry_point)?;

        let installed = slot.get();
        if let Some(current) = binding.take() {
            if Arc::ptr_eq(&current.slot, &slot) && same_callback(&installed, &current.wrapper) {
                *binding = Some(current);
                return Ok(BridgeState::Bound);
            }
            if !Arc::ptr_eq(&current.slot, &slot) {
                // Slot replaced wholesale; hand the stale one its original back.
                current.slot.compare_and_set(&current.wrapper, Arc::clone(&current.original));
            }
            log::info!(
                "[Bridge] Gate no longer installed on '{}' (foreign reload), rebinding",
                self.entry_point
            );
        }

        let wrapper = self.gate.wrap(Arc::clone(&installed));
        if !slot.compare_and_set(&installed, Arc::clone(&wrapper)) || !same_callback(&slot.get(), &wrapper) {
            return Err(BridgeError::WrapperNotRetained(self.entry_point.clone()));
        }
        *binding = Some(Binding { slot, original: installed, wrapper });
        log::info!("[Bridge] Gate installed on entry point '{}'", self.entry_point);
        Ok(BridgeState::Bound)
    }

    /// Put the captured original back. Returns true if the slot was restored.
    fn restore(&self) -> bool {
        let Some(binding) = self.lock_binding().take() else {
            return false;
        };
        if binding.slot.compare_and_set(&binding.wrapper, Arc::clone(&binding.original)) {
            log::info!("[Bridge] Original callback restored on '{}'", self.entry_point);
            true
        } else {
            log::warn!(
                "[Bridge] '{}' was replaced by its owner since binding; left untouched",
                self.entry_point
            );
            false
        }
    }
}

/// Owns the reconciliation thread and the binding it maintains.
pub struct TakeoverBridge {
    core: Arc<BridgeCore>,
    config: BridgeConfig,
    stop_flag: Arc<AtomicBool>,
    join_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl TakeoverBridge {
    /// # Arguments
    /// * `registry` - Foreign component's entry point lookup
    /// * `entry_point` - Name of the action to gate
    /// * `gate` - Verification gate the wrapper delegates to
    /// * `config` - Poll interval and operating mode
    pub fn new(
        registry: Arc<dyn EntryPointRegistry>,
        entry_point: impl Into<String>,
        gate: Arc<ActionGate>,
        config: BridgeConfig,
    ) -> Self {
        TakeoverBridge {
            core: Arc::new(BridgeCore {
                registry,
                entry_point: entry_point.into(),
                gate,
                binding: Mutex::new(None),
            }),
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        }
    }

    pub fn entry_point(&self) -> &str {
        &self.core.entry_point
    }

    pub fn state(&self) -> BridgeState {
        self.core.state()
    }

    /// Original callback captured by the current binding.
    pub fn original(&self) -> Option<ActionCallback> {
        self.core.lock_binding().as_ref().map(|b| Arc::clone(&b.original))
    }

    /// Run a single reconciliation cycle on the calling thread.
    pub fn reconcile(&self) -> Result<BridgeState, BridgeError> {
        self.core.reconcile()
    }

    /// Start the background poll loop. A no-op while it is already running.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut handle = self.join_handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        self.stop_flag.store(false, Ordering::Release);

        let core = Arc::clone(&self.core);
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("gate-bridge".to_string())
            .spawn(move || poll_loop(&core, &stop_flag, &config))
            .map_err(|e| BridgeError::ForeignComponentUnavailable(format!("failed to spawn poll thread: {}", e)))?;
        *handle = Some(spawned);
        log::info!("[Bridge] Polling '{}' ({:?})", self.core.entry_point, self.config.mode);
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.join_handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Invoke the gated action through the bridge's wrapper.
    ///
    /// Reconciles first so a foreign reload since the last poll is picked up.
    pub fn dispatch(&self, request: ActionRequest) -> Result<ActionOutcome, BridgeError> {
        self.core.reconcile()?;
        let wrapper = self
            .core
            .lock_binding()
            .as_ref()
            .map(|b| Arc::clone(&b.wrapper))
            .ok_or_else(|| BridgeError::NotBound(self.core.entry_point.clone()))?;
        Ok(wrapper(request))
    }

    /// Stop polling and restore the original callback.
    ///
    /// The loop finishes its current cycle before the restore happens, so the
    /// slot is never restored while a swap is half-applied.
    pub fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::Release);
        let handle = self.join_handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("[Bridge] Poll thread panicked");
            }
        }
        self.core.restore();
    }
}

impl Drop for TakeoverBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(core: &BridgeCore, stop_flag: &AtomicBool, config: &BridgeConfig) {
    let started = Instant::now();
    let mut last_error: Option<String> = None;

    while !stop_flag.load(Ordering::Acquire) {
        match core.reconcile() {
            Ok(_) => last_error = None,
            Err(e) => {
                let message = e.to_string();
                if last_error.as_deref() != Some(message.as_str()) {
                    log::warn!("[Bridge] {} (will retry)", message);
                } else {
                    log::debug!("[Bridge] {} (will retry)", message);
                }
                last_error = Some(message);
            }
        }

        if let PollMode::Bounded(window) = config.mode {
            if started.elapsed() >= window {
                log::info!("[Bridge] Polling window of {:?} elapsed, state {:?}", window, core.state());
                return;
            }
        }
        sleep_cancellable(config.poll_interval, stop_flag);
    }
    log::debug!("[Bridge] Poll loop stopped");
}

/// Sleep for `total`, waking early once `stop_flag` is set.
fn sleep_cancellable(total: Duration, stop_flag: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !stop_flag.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(STOP_CHECK_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_mode_from_override_mode() {
        let window = Duration::from_secs(5);
        assert_eq!(PollMode::from_override_mode(OverrideMode::Thread, window), PollMode::Continuous);
        assert_eq!(PollMode::from_override_mode(OverrideMode::Event, window), PollMode::Bounded(window));
    }

    #[test]
    fn test_sleep_cancellable_returns_early_when_stopped() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        sleep_cancellable(Duration::from_secs(5), &stop);
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
