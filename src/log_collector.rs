//! Decoupled logging pipeline for the gate.
//!
//! # Architecture
//!
//! ```text
//! log::info!() / warn!() / ...
//!     |
//! [LogCollector] (log::Log, non-blocking)
//!     | (crossbeam unbounded channel)
//!     v
//! [DiskPersister thread] ──> logs/<YYYYmmdd_HHMMSS>_gate.log
//!     |
//!     └── WARN and above also echoed to stderr
//! ```
//!
//! Logging from a probe waiter, the bridge poll thread or a tokio worker never
//! blocks on disk I/O. `wait_for_empty()` is the only synchronous point.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// Get the global logs path relative to the current working directory: ./logs
pub fn get_global_logs_path() -> Result<PathBuf, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Failed to get current working directory: {}", e))?;
    Ok(cwd.join("logs"))
}

/// Ensure the global logs directory exists
pub fn ensure_logs_dir_exists(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|e| format!("Failed to create logs directory: {}", e))
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub level: Level,
    /// `HH:MM:SS.mmm`, taken when the line was created
    pub timestamp: String,
}

impl LogLine {
    pub fn new(level: Level, message: String) -> Self {
        LogLine {
            message,
            level,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn format(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

/// Logger that hands every record to a background disk writer.
#[derive(Clone)]
pub struct LogCollector {
    /// Channel sender for log lines - crossbeam unbounded so senders never block
    tx: Sender<LogMessage>,
    level: LevelFilter,
    log_path: Arc<PathBuf>,
}

impl LogCollector {
    /// Create the session log file under `log_dir` and start the writer thread.
    pub fn new(log_dir: PathBuf, level: LevelFilter) -> Result<Self, String> {
        ensure_logs_dir_exists(&log_dir)?;
        let log_path = create_session_log(&log_dir)?;

        let (tx, rx) = unbounded::<LogMessage>();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| format!("Failed to open log file {}: {}", log_path.display(), e))?;

        // OS thread, not a tokio task: it must outlive runtime shutdown to drain the channel
        std::thread::Builder::new()
            .name("log-persister".to_string())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    match msg {
                        LogMessage::Line(line) => {
                            let formatted = line.format();
                            if line.level <= Level::Warn {
                                eprintln!("{}", formatted);
                            }
                            let _ = writeln!(file, "{}", formatted);
                        }
                        LogMessage::Flush(done) => {
                            let _ = file.flush();
                            let _ = file.sync_data();
                            let _ = done.send(());
                        }
                    }
                }
                let _ = file.flush();
            })
            .map_err(|e| format!("Failed to spawn log persister: {}", e))?;

        Ok(LogCollector { tx, level, log_path: Arc::new(log_path) })
    }

    /// Install this collector as the global `log` backend.
    pub fn install(&self) -> Result<(), String> {
        log::set_boxed_logger(Box::new(self.clone()))
            .map(|()| log::set_max_level(self.level))
            .map_err(|e| format!("Failed to set LogCollector as global logger: {}", e))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Send a log line (non-blocking)
    pub fn log_line(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Block until every line sent before this call is on disk.
    pub fn wait_for_empty(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv().map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.log_line(LogLine::new(record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

/// Create a fresh `<timestamp>_gate.log` in `log_dir`.
fn create_session_log(log_dir: &Path) -> Result<PathBuf, String> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("{}_gate.log", timestamp));
    if !log_path.exists() {
        File::create(&log_path).map_err(|e| format!("Failed to create log file: {}", e))?;
    }
    Ok(log_path)
}
