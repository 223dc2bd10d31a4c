use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use backup_gate::bridge::EntryPointRegistry;
use backup_gate::commands::{parse_input, ConsoleInput};
use backup_gate::log_collector::get_global_logs_path;
use backup_gate::{
    tree, ActionGate, BridgeConfig, CheckpointStore, CommandRegistry, CommandSink, GateContext, LineHub,
    LogCollector, PollMode, SettingsManager, ShellBackupAction, StateProbe, TakeoverBridge,
    VerificationOrchestrator, VERSION,
};
use backup_gate::console::ServerProcess;

/// How long the server gets to stop on its own before it is killed.
const SERVER_STOP_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> backup_gate::Result<()> {
    // =========================================================================
    // SETTINGS + LOGGING - MUST BE FIRST
    // =========================================================================
    let settings = SettingsManager::load().map_err(|e| {
        eprintln!("[Main] ERROR: Failed to load settings: {}", e);
        e
    })?;

    let log_collector = LogCollector::new(get_global_logs_path()?, settings.log_level())?;
    if let Err(e) = log_collector.install() {
        eprintln!("[Main] WARNING: {}", e);
    }
    log::info!("[Main] Backup Gate {} starting, logging to {}", VERSION, log_collector.log_path().display());

    // =========================================================================
    // CHECKPOINTS
    // =========================================================================
    let store = CheckpointStore::new(settings.checkpoint_path());
    let document = store.load()?;
    let override_mode = document.override_mode;
    let tree = tree::shared(document.tree);

    // =========================================================================
    // SERVER CONSOLE + PROBE
    // =========================================================================
    let hub = LineHub::new();
    let server = Arc::new(ServerProcess::spawn(
        &settings.server_command,
        Path::new(&settings.server_dir),
        hub.clone(),
    )?);
    let sink: Arc<dyn CommandSink> = server.clone();
    let probe = Arc::new(StateProbe::new(sink, settings.probe_config()));
    probe.attach(&hub)?;
    let orchestrator = Arc::new(VerificationOrchestrator::new(probe, settings.settle_delay()));

    // =========================================================================
    // BACKUP COMMAND + BRIDGE
    // =========================================================================
    let registry = Arc::new(CommandRegistry::new());
    let backup_action =
        ShellBackupAction::new(settings.backup_command.clone(), &settings.server_dir).into_callback();
    registry.register(&settings.entry_point, Arc::clone(&backup_action));

    let gate = Arc::new(ActionGate::new(Arc::clone(&orchestrator), Arc::clone(&tree)));
    let entry_points: Arc<dyn EntryPointRegistry> = registry.clone();
    let bridge = Arc::new(TakeoverBridge::new(
        entry_points,
        settings.entry_point.clone(),
        gate,
        BridgeConfig {
            poll_interval: settings.poll_interval(),
            mode: PollMode::from_override_mode(override_mode, settings.bounded_window()),
        },
    ));
    bridge.start()?;

    let context = Arc::new(GateContext::new(
        tree,
        store,
        override_mode,
        orchestrator,
        registry,
        Arc::clone(&bridge),
        backup_action,
    ));

    // =========================================================================
    // OPERATOR CONSOLE
    // =========================================================================
    log::info!("[Main] Ready. '{} cp help' lists gate commands", settings.command_prefix);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                log::info!("[Main] Interrupted");
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("[Main] Failed to read operator input: {}", e);
                break;
            }
        };

        match parse_input(&line, &settings.command_prefix) {
            Ok(ConsoleInput::Empty) => {}
            Ok(ConsoleInput::Stop) => break,
            Ok(ConsoleInput::Forward(command)) => {
                if let Err(e) = server.execute(&command) {
                    log::error!("[Main] Could not forward '{}': {}", command, e);
                }
            }
            Ok(ConsoleInput::Gate(command)) => {
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    for reply in context.run(command).await.lines {
                        println!("[Gate] {}", reply);
                    }
                });
            }
            Err(e) => println!("[Gate] Error: {}", e.user_message()),
        }
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================
    log::info!("[Main] Shutting down");
    bridge.shutdown();
    let stopping = Arc::clone(&server);
    match tokio::task::spawn_blocking(move || stopping.shutdown(SERVER_STOP_GRACE)).await {
        Ok(Err(e)) => log::error!("[Main] Server shutdown failed: {}", e),
        Err(e) => log::error!("[Main] Server shutdown task failed: {}", e),
        Ok(Ok(())) => log::info!("[Main] Server stopped"),
    }
    if let Err(e) = log_collector.wait_for_empty() {
        eprintln!("[Main] WARNING: {}", e);
    }
    Ok(())
}
