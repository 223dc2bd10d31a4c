//! Integration tests for operator commands, run through the async dispatch path.

mod common;

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backup_gate::bridge::{ActionCallback, ActionOutcome, ActionRequest, EntryPointRegistry};
use backup_gate::commands::{parse_gate_command, ListStyle};
use backup_gate::{
    tree, ActionGate, BridgeConfig, CheckpointStore, CheckpointTree, CommandRegistry, Coords, GateCommand,
    GateContext, OverrideMode, PollMode, Realm, TakeoverBridge,
};
use common::{lever, Harness};
use tempfile::TempDir;

struct Setup {
    harness: Harness,
    context: Arc<GateContext>,
    store: CheckpointStore,
    calls: Arc<Mutex<Vec<ActionRequest>>>,
    _dir: TempDir,
}

fn setup() -> Setup {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(Duration::from_millis(5), Duration::from_millis(150));
    let store = CheckpointStore::new(dir.path().join("config/check_point.json"));
    let shared = tree::shared(CheckpointTree::new());

    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let backup: ActionCallback = Arc::new(move |request: ActionRequest| {
        recorded.lock().unwrap().push(request);
        ActionOutcome::Completed("Backup finished".to_string())
    });
    let registry = Arc::new(CommandRegistry::new());
    registry.register("make", Arc::clone(&backup));

    let orchestrator = harness.orchestrator();
    let gate = Arc::new(ActionGate::new(Arc::clone(&orchestrator), Arc::clone(&shared)));
    let entry_points: Arc<dyn EntryPointRegistry> = registry.clone();
    let bridge = Arc::new(TakeoverBridge::new(
        entry_points,
        "make",
        gate,
        BridgeConfig { poll_interval: Duration::from_millis(20), mode: PollMode::Continuous },
    ));

    let context = Arc::new(GateContext::new(
        shared,
        store.clone(),
        OverrideMode::Thread,
        orchestrator,
        registry,
        bridge,
        backup,
    ));
    Setup { harness, context, store, calls, _dir: dir }
}

async fn run(setup: &Setup, words: &[&str]) -> Vec<String> {
    let command = parse_gate_command(words).unwrap();
    Arc::clone(&setup.context).run(command).await.lines
}

#[tokio::test]
async fn test_add_captures_state_and_persists() {
    let setup = setup();
    setup
        .harness
        .server
        .set_block(Realm::TheNether, Coords::new(1, 2, 3), lever(false));

    let reply = run(&setup, &["cp", "add", "1", "2", "3", "lamp", "the_nether"]).await;
    assert!(reply[0].starts_with("Added lamp"), "{:?}", reply);

    let saved = setup.store.load().unwrap();
    let lamp = saved.tree.resolve_checkpoint("lamp").unwrap();
    assert_eq!(lamp.world, Realm::TheNether);
    assert_eq!(lamp.expected(), lever(false));
}

#[tokio::test]
async fn test_add_rejects_taken_name_before_probing() {
    let setup = setup();
    setup.harness.server.set_block(Realm::Overworld, Coords::new(0, 0, 0), lever(false));
    run(&setup, &["cp", "add", "0", "0", "0", "lamp"]).await;
    let queries_before = setup.harness.server.queries().len();

    let reply = run(&setup, &["cp", "add", "0", "0", "0", "lamp"]).await;
    assert_eq!(reply, vec!["Error: Name already in use: lamp".to_string()]);
    assert_eq!(setup.harness.server.queries().len(), queries_before);
}

#[tokio::test]
async fn test_add_without_response_is_rejected() {
    let setup = setup();
    let reply = run(&setup, &["cp", "add", "7", "7", "7", "ghost"]).await;
    assert!(reply[0].contains("no response"), "{:?}", reply);
    assert!(setup.context.tree().read().unwrap().is_empty());
    assert!(!setup.store.path().exists());
}

#[tokio::test]
async fn test_groups_add_to_and_tree_listing() {
    let setup = setup();
    setup.harness.server.set_block(Realm::Overworld, Coords::new(4, 5, 6), lever(false));

    let reply = run(&setup, &["cp", "group", "farm.iron", "iron", "farms"]).await;
    assert_eq!(reply, vec!["Created group farm.iron (2 new)".to_string()]);
    run(&setup, &["cp", "add-to", "farm.iron", "4", "5", "6", "door"]).await;

    let listing = setup.context.execute(GateCommand::List(ListStyle::Tree)).lines;
    assert_eq!(listing[0], "farm/");
    assert_eq!(listing[1], "  iron/ - iron farms");
    assert!(listing[2].starts_with("    door: overworld (4, 5, 6) minecraft:lever"), "{:?}", listing);

    let flat = setup.context.execute(GateCommand::List(ListStyle::Flat)).lines;
    assert_eq!(flat.len(), 1);
    assert!(flat[0].starts_with("[1] farm.iron.door:"));
}

#[tokio::test]
async fn test_status_reports_mismatch_then_update_fixes_it() {
    let setup = setup();
    let coords = Coords::new(8, 64, 8);
    setup.harness.server.set_block(Realm::Overworld, coords, lever(false));
    run(&setup, &["cp", "add", "8", "64", "8", "lamp"]).await;

    setup.harness.server.set_block(Realm::Overworld, coords, lever(true));
    let status = run(&setup, &["cp", "status", "lamp"]).await;
    assert_eq!(status.last().map(String::as_str), Some("Machine is ON"));

    run(&setup, &["cp", "update", "lamp"]).await;
    let status = run(&setup, &["cp", "st", "lamp"]).await;
    assert_eq!(status.last().map(String::as_str), Some("Machine is off"));

    let saved = setup.store.load().unwrap();
    let lamp = saved.tree.resolve_checkpoint("lamp").unwrap();
    assert_eq!(lamp.data.get("powered").map(String::as_str), Some("true"));
    assert_eq!((lamp.x, lamp.y, lamp.z), (8, 64, 8));
}

#[tokio::test]
async fn test_status_of_group_summarizes_members() {
    let setup = setup();
    setup.harness.server.set_block(Realm::Overworld, Coords::new(1, 1, 1), lever(false));
    run(&setup, &["cp", "group", "farm"]).await;
    run(&setup, &["cp", "add-to", "farm", "1", "1", "1", "lamp"]).await;

    let status = run(&setup, &["cp", "status", "farm"]).await;
    assert_eq!(status, vec!["All 1 checkpoint(s) report off".to_string()]);
}

#[tokio::test]
async fn test_delete_and_missing_paths() {
    let setup = setup();
    setup.harness.server.set_block(Realm::Overworld, Coords::new(1, 1, 1), lever(false));
    run(&setup, &["cp", "add", "1", "1", "1", "lamp"]).await;

    assert_eq!(run(&setup, &["cp", "del", "lamp"]).await, vec!["Deleted lamp".to_string()]);
    assert_eq!(
        run(&setup, &["cp", "del", "lamp"]).await,
        vec!["Error: No such checkpoint or group: lamp".to_string()]
    );
    assert!(setup.store.load().unwrap().tree.is_empty());
}

#[tokio::test]
async fn test_make_refused_then_ignore_forces() {
    let setup = setup();
    let coords = Coords::new(2, 2, 2);
    setup.harness.server.set_block(Realm::Overworld, coords, lever(false));
    run(&setup, &["cp", "add", "2", "2", "2", "lamp"]).await;
    setup.harness.server.set_block(Realm::Overworld, coords, lever(true));

    let refused = run(&setup, &["make", "nightly"]).await;
    assert_eq!(refused[0], "Machines not verifiably off: lamp");
    assert!(setup.calls.lock().unwrap().is_empty());

    let forced = run(&setup, &["ig", "nightly"]).await;
    assert_eq!(forced, vec!["Backup finished".to_string()]);
    assert_eq!(
        setup.calls.lock().unwrap()[0].comment.as_deref(),
        Some("nightly forced: machines not off (lamp)")
    );
}

#[tokio::test]
async fn test_reload_is_gated_again() {
    let setup = setup();
    let coords = Coords::new(3, 3, 3);
    setup.harness.server.set_block(Realm::Overworld, coords, lever(false));
    run(&setup, &["cp", "add", "3", "3", "3", "lamp"]).await;
    setup.harness.server.set_block(Realm::Overworld, coords, lever(true));

    run(&setup, &["make"]).await;
    assert_eq!(run(&setup, &["reload"]).await, vec!["Reloaded 'make'".to_string()]);
    let refused = run(&setup, &["make"]).await;
    assert_eq!(refused[0], "Machines not verifiably off: lamp");
    assert!(setup.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_is_reported() {
    let setup = setup();
    // A directory where the document should be makes the rename fail
    fs::create_dir_all(setup.store.path()).unwrap();

    let reply = run(&setup, &["cp", "group", "farm"]).await;
    assert!(reply[0].starts_with("Error: Change applied but not saved"), "{:?}", reply);
    assert!(setup.context.tree().read().unwrap().resolve_group("farm").is_ok());
}
