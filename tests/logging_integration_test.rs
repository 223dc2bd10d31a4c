use std::fs;

use backup_gate::LogCollector;
use log::LevelFilter;

/// Integration test for the logging system
///
/// Tests that:
/// 1. LogCollector installs as the global `log` backend
/// 2. Records below the configured level are dropped
/// 3. wait_for_empty() makes every earlier record visible on disk
#[test]
fn test_logging_integration_full_cycle() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let collector =
        LogCollector::new(temp_dir.path().join("logs"), LevelFilter::Info).expect("Failed to initialize LogCollector");
    collector.install().expect("Failed to install global logger");

    log::info!("[Test] gate ready");
    log::debug!("[Test] hidden detail");
    log::warn!("[Test] machine lamp is on");
    collector.wait_for_empty().expect("Flush failed");

    let content = fs::read_to_string(collector.log_path()).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected log content: {}", content);
    assert!(lines[0].ends_with("[INFO] [Test] gate ready"));
    assert!(lines[1].ends_with("[WARN] [Test] machine lamp is on"));
    assert!(lines[0].starts_with('['));

    // A second install in the same process is refused
    assert!(collector.install().is_err());
}
