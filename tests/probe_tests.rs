//! Integration tests for the state probe against a fake server.
//!
//! Test Organization:
//! - Answered / unanswered probes
//! - Attribution under concurrency
//! - Listener filtering

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use backup_gate::{BlockState, Coords, ProbeError, Realm};
use common::{lever, Harness};

// ============================================================================
// ANSWERED / UNANSWERED
// ============================================================================

#[test]
fn test_probe_returns_observed_state() {
    let harness = Harness::quick();
    let coords = Coords::new(10, 64, -3);
    harness.server.set_block(Realm::Overworld, coords, lever(false));

    let result = harness.probe.probe(coords, "overworld").unwrap();
    assert!(result.matched);
    assert_eq!(result.state, lever(false));
    assert_eq!(
        harness.server.queries(),
        vec!["execute in minecraft:overworld run info block 10 64 -3".to_string()]
    );
}

#[test]
fn test_timeout_is_distinct_from_mismatch() {
    let harness = Harness::new(Duration::from_millis(5), Duration::from_millis(100));
    let answered = Coords::new(1, 1, 1);
    let silent = Coords::new(2, 2, 2);
    harness.server.set_block(Realm::TheEnd, answered, BlockState::new("minecraft:stone"));

    let mismatch = harness.probe.probe_realm(answered, Realm::TheEnd).unwrap();
    assert!(mismatch.matched);
    assert_ne!(mismatch.state, lever(false));

    let started = Instant::now();
    let unknown = harness.probe.probe_realm(silent, Realm::TheEnd).unwrap();
    assert!(!unknown.matched);
    assert!(unknown.state.block.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(100));

    let err = harness.probe.capture(silent, Realm::TheEnd).unwrap_err();
    assert!(matches!(err, ProbeError::Timeout { .. }));
}

#[test]
fn test_realm_is_part_of_the_query() {
    let harness = Harness::quick();
    let coords = Coords::new(0, 70, 0);
    harness.server.set_block(Realm::TheNether, coords, lever(true));

    assert!(!harness.probe.probe_realm(coords, Realm::Overworld).unwrap().matched);
    let nether = harness.probe.probe(coords, "minecraft:the_nether").unwrap();
    assert!(nether.matched);
    assert_eq!(nether.state, lever(true));
}

// ============================================================================
// ATTRIBUTION UNDER CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_probes_never_overlap() {
    let harness = Harness::new(Duration::from_millis(40), Duration::from_millis(500));
    let coords: Vec<Coords> = (0..4).map(|i| Coords::new(i, 64, 0)).collect();
    for (i, c) in coords.iter().enumerate() {
        harness
            .server
            .set_block(Realm::Overworld, *c, BlockState::new(format!("minecraft:block_{}", i)));
    }

    let handles: Vec<_> = coords
        .iter()
        .map(|c| {
            let probe = Arc::clone(&harness.probe);
            let c = *c;
            thread::spawn(move || (c, probe.probe_realm(c, Realm::Overworld).unwrap()))
        })
        .collect();

    for handle in handles {
        let (c, result) = handle.join().unwrap();
        assert!(result.matched);
        assert_eq!(result.state.block, format!("minecraft:block_{}", c.x));
    }
    assert_eq!(harness.server.max_in_flight(), 1);
}

#[test]
fn test_first_match_wins() {
    let harness = Harness::new(Duration::from_millis(120), Duration::from_millis(400));
    let coords = Coords::new(5, 5, 5);
    harness.server.set_block(Realm::Overworld, coords, lever(false));

    let probe = Arc::clone(&harness.probe);
    let waiter = thread::spawn(move || probe.probe_realm(coords, Realm::Overworld).unwrap());

    // An unrelated answer lands first and is taken; the real one is then ignored
    thread::sleep(Duration::from_millis(30));
    harness.server.publish_raw("Block info for minecraft:stone");
    let result = waiter.join().unwrap();
    assert!(result.matched);
    assert_eq!(result.state.block, "minecraft:stone");
}

// ============================================================================
// LISTENER FILTERING
// ============================================================================

#[test]
fn test_chat_lines_are_never_responses() {
    let harness = Harness::new(Duration::from_millis(5), Duration::from_millis(150));
    let coords = Coords::new(9, 9, 9);

    let probe = Arc::clone(&harness.probe);
    let waiter = thread::spawn(move || probe.probe_realm(coords, Realm::Overworld).unwrap());
    thread::sleep(Duration::from_millis(10));
    harness.server.chat("Steve", "Block info for minecraft:lever: powered=false");

    assert!(!waiter.join().unwrap().matched);
}

#[test]
fn test_invalid_realm_emits_nothing() {
    let harness = Harness::quick();
    let err = harness.probe.probe(Coords::new(0, 0, 0), "overworld2").unwrap_err();
    assert!(matches!(err, ProbeError::InvalidArgument(_)));
    assert!(harness.server.queries().is_empty());
}
