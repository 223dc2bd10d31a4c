//! Shared fixtures: an in-process fake server that answers block-info queries.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use backup_gate::error::ConsoleError;
use backup_gate::{
    BlockState, Checkpoint, CommandSink, ConsoleLine, Coords, LineHub, ProbeConfig, Realm, StateProbe,
    VerificationOrchestrator,
};

static QUERY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^execute in minecraft:(\w+) run info block (-?\d+) (-?\d+) (-?\d+)$").unwrap()
});

/// Answers `info block` queries from a fixed world map after `delay`.
///
/// Unknown positions get no answer at all.
pub struct FakeServer {
    hub: LineHub,
    world: Mutex<HashMap<(Realm, Coords), BlockState>>,
    delay: Duration,
    queries: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl FakeServer {
    pub fn new(hub: LineHub, delay: Duration) -> Arc<Self> {
        Arc::new(FakeServer {
            hub,
            world: Mutex::new(HashMap::new()),
            delay,
            queries: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_block(&self, realm: Realm, coords: Coords, state: BlockState) {
        self.world.lock().unwrap().insert((realm, coords), state);
    }

    pub fn remove_block(&self, realm: Realm, coords: Coords) {
        self.world.lock().unwrap().remove(&(realm, coords));
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Most queries ever awaiting an answer at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn chat(&self, player: &str, message: &str) {
        self.hub.publish(ConsoleLine::user(format!("<{}> {}", player, message)));
    }

    pub fn publish_raw(&self, content: &str) {
        self.hub.publish(ConsoleLine::system(content));
    }
}

pub fn render_state(state: &BlockState) -> String {
    let attributes: Vec<String> = state.attributes.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("Block info for {}: {}", state.block, attributes.join(" "))
}

impl CommandSink for FakeServer {
    fn execute(&self, command: &str) -> Result<(), ConsoleError> {
        self.queries.lock().unwrap().push(command.to_string());
        let caps = QUERY_REGEX
            .captures(command)
            .ok_or_else(|| ConsoleError::Closed(format!("unexpected command: {}", command)))?;
        let realm: Realm = caps[1].parse().unwrap();
        let coords = Coords::new(caps[2].parse().unwrap(), caps[3].parse().unwrap(), caps[4].parse().unwrap());
        let Some(state) = self.world.lock().unwrap().get(&(realm, coords)).cloned() else {
            return Ok(());
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let hub = self.hub.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let delay = self.delay;
        let line = render_state(&state);
        thread::spawn(move || {
            thread::sleep(delay);
            in_flight.fetch_sub(1, Ordering::SeqCst);
            hub.publish(ConsoleLine::system(line));
        });
        Ok(())
    }
}

/// Fake server plus a probe listening to it.
pub struct Harness {
    pub hub: LineHub,
    pub server: Arc<FakeServer>,
    pub probe: Arc<StateProbe>,
}

impl Harness {
    pub fn new(delay: Duration, timeout: Duration) -> Self {
        let hub = LineHub::new();
        let server = FakeServer::new(hub.clone(), delay);
        let sink: Arc<dyn CommandSink> = server.clone();
        let probe = Arc::new(StateProbe::new(sink, ProbeConfig { timeout, ..Default::default() }));
        probe.attach(&hub).unwrap();
        Harness { hub, server, probe }
    }

    /// Fast server, short timeout.
    pub fn quick() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_millis(300))
    }

    pub fn orchestrator(&self) -> Arc<VerificationOrchestrator> {
        Arc::new(VerificationOrchestrator::new(Arc::clone(&self.probe), Duration::from_millis(5)))
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.hub.close();
    }
}

pub fn lever(powered: bool) -> BlockState {
    BlockState::new("minecraft:lever")
        .with_attribute("face", "floor")
        .with_attribute("powered", if powered { "true" } else { "false" })
}

pub fn lever_checkpoint(x: i32) -> Checkpoint {
    Checkpoint::new(Coords::new(x, 64, 0), Realm::Overworld, lever(false))
}
