//! State Probe: one block-info query at a time over the server console.
//!
//! The console has no request framing, so a query and its answer are
//! correlated purely by order:
//!
//! 1. the pending slot is re-armed with a fresh single-use sender (any stale
//!    match from an earlier query is discarded with the old sender),
//! 2. exactly one query line is emitted,
//! 3. the listener fills the slot with the first matching system line and
//!    disarms it, so later matches for the same query are ignored,
//! 4. the prober waits on the receiving end with a timeout.
//!
//! Probes are serialized by an internal lock: a second caller blocks until
//! the first query's window has closed.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::console::{CommandSink, ConsoleLine, LineHub};
use crate::error::ProbeError;
use crate::models::{BlockState, Coords, Realm};

static BLOCK_INFO_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Block info for (?P<block>minecraft:\w+)").expect("Invalid block info regex")
});
static ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<key>\w+)=(?P<value>'[^']*'|"[^"]*"|\w+)"#).expect("Invalid attribute regex")
});

/// Default query: run carpet's block info in the target dimension.
pub const DEFAULT_QUERY_TEMPLATE: &str = "execute in minecraft:{world} run info block {x} {y} {z}";

/// Parse a block-info response line into the reported state.
///
/// Attribute values are kept verbatim, quotes included.
pub fn parse_block_info(content: &str) -> Option<BlockState> {
    let caps = BLOCK_INFO_REGEX.captures(content)?;
    let block = caps.name("block")?;
    let attributes = ATTRIBUTE_REGEX
        .captures_iter(&content[block.end()..])
        .filter_map(|c| Some((c.name("key")?.as_str().to_string(), c.name("value")?.as_str().to_string())))
        .collect();
    Some(BlockState { block: block.as_str().to_string(), attributes })
}

/// Outcome of one probe. `matched == false` means the state is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub matched: bool,
    pub state: BlockState,
}

impl ProbeResult {
    fn matched(state: BlockState) -> Self {
        ProbeResult { matched: true, state }
    }

    fn unmatched() -> Self {
        ProbeResult { matched: false, state: BlockState::default() }
    }

    /// The observed state, or `ProbeError::Timeout` if nothing answered.
    pub fn into_state(self, coords: Coords, timeout: Duration) -> Result<BlockState, ProbeError> {
        if self.matched {
            Ok(self.state)
        } else {
            Err(ProbeError::Timeout { coords: coords.to_string(), timeout_ms: timeout.as_millis() as u64 })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub query_template: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout: Duration::from_millis(400),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
        }
    }
}

type PendingSlot = Arc<Mutex<Option<Sender<BlockState>>>>;

fn lock_slot(slot: &PendingSlot) -> MutexGuard<'_, Option<Sender<BlockState>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Feeds console lines into the probe's pending slot.
#[derive(Clone)]
pub struct ProbeListener {
    pending: PendingSlot,
}

impl ProbeListener {
    /// Offer one console line. Returns true if it answered a pending query.
    pub fn on_line(&self, line: &ConsoleLine) -> bool {
        if line.is_user {
            return false;
        }
        let Some(state) = parse_block_info(&line.content) else {
            return false;
        };
        // First match wins: taking the sender disarms the slot.
        let Some(tx) = lock_slot(&self.pending).take() else {
            log::debug!("[Probe] Unsolicited block info ignored: {}", state);
            return false;
        };
        log::info!("[Probe] Block info match found: {}", state);
        tx.try_send(state).is_ok()
    }
}

pub struct StateProbe {
    sink: Arc<dyn CommandSink>,
    pending: PendingSlot,
    serial: Mutex<()>,
    config: ProbeConfig,
}

impl StateProbe {
    pub fn new(sink: Arc<dyn CommandSink>, config: ProbeConfig) -> Self {
        StateProbe {
            sink,
            pending: Arc::new(Mutex::new(None)),
            serial: Mutex::new(()),
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn listener(&self) -> ProbeListener {
        ProbeListener { pending: Arc::clone(&self.pending) }
    }

    /// Subscribe to `hub` and feed every line to the listener on a
    /// background thread. The thread ends when the hub is closed.
    pub fn attach(&self, hub: &LineHub) -> io::Result<thread::JoinHandle<()>> {
        let rx = hub.subscribe();
        let listener = self.listener();
        thread::Builder::new().name("probe-listener".to_string()).spawn(move || {
            for line in rx.iter() {
                listener.on_line(&line);
            }
            log::debug!("[Probe] Listener stopped (console closed)");
        })
    }

    fn render_query(&self, coords: Coords, realm: Realm) -> String {
        self.config
            .query_template
            .replace("{world}", realm.as_str())
            .replace("{x}", &coords.x.to_string())
            .replace("{y}", &coords.y.to_string())
            .replace("{z}", &coords.z.to_string())
    }

    /// Query the block at `coords` in realm `world`.
    ///
    /// # Errors
    /// `InvalidArgument` for an unknown realm tag (nothing is emitted) and
    /// `Emit` if the query could not be written. A missing answer is not an
    /// error: it yields `matched == false`.
    pub fn probe(&self, coords: Coords, world: &str) -> Result<ProbeResult, ProbeError> {
        let realm: Realm = world.parse()?;
        self.probe_realm(coords, realm)
    }

    pub fn probe_realm(&self, coords: Coords, realm: Realm) -> Result<ProbeResult, ProbeError> {
        let _window = self.serial.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let (tx, rx) = bounded(1);
        *lock_slot(&self.pending) = Some(tx);

        let query = self.render_query(coords, realm);
        if let Err(e) = self.sink.execute(&query) {
            lock_slot(&self.pending).take();
            return Err(ProbeError::Emit(e.to_string()));
        }
        log::debug!("[Probe] Sent query: {}", query);

        match rx.recv_timeout(self.config.timeout) {
            Ok(state) => Ok(ProbeResult::matched(state)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                lock_slot(&self.pending).take();
                log::warn!(
                    "[Probe] No block info for {} in {} within {:?}",
                    coords,
                    realm,
                    self.config.timeout
                );
                Ok(ProbeResult::unmatched())
            }
        }
    }

    /// Probe and require an answer.
    pub fn capture(&self, coords: Coords, realm: Realm) -> Result<BlockState, ProbeError> {
        self.probe_realm(coords, realm)?.into_state(coords, self.config.timeout)
    }
}
