//! Backup Gate
//!
//! Verifies that registered redstone machines are switched off before a
//! Minecraft server backup is allowed to run.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Realms, coordinates, block states and checkpoints
//! - **console**: Server console line stream and command sink
//! - **probe**: Block state queries correlated over the console stream
//! - **tree**: Hierarchical checkpoint/group namespace
//! - **orchestrator**: Verification walks and reports
//! - **bridge**: Takeover of the backup command's entry point
//! - **host**: Command registry and the shell backup action
//! - **commands**: Operator command parsing and handlers
//! - **config**: Settings and the persisted checkpoint document
//! - **log_collector**: Decoupled logging pipeline

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod console;
pub mod log_collector;

pub mod probe;
pub mod tree;

pub mod bridge;
pub mod orchestrator;

pub mod commands;
pub mod host;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AppError, BridgeError, ConfigError, ConsoleError, ProbeError, Result, TreeError};

pub use models::{BlockState, Checkpoint, Coords, Realm};

pub use config::store::{CheckpointDocument, CheckpointStore, OverrideMode};
pub use config::{GateSettings, SettingsManager};

pub use console::{CommandSink, ConsoleLine, LineHub};
pub use log_collector::{LogCollector, LogLine};

pub use probe::{ProbeConfig, ProbeResult, StateProbe};
pub use tree::{CheckpointTree, Group, Node, SharedTree, TreePath};

pub use bridge::{ActionGate, BridgeConfig, BridgeState, PollMode, TakeoverBridge};
pub use orchestrator::{VerificationOrchestrator, VerificationReport, VerificationSummary};

pub use commands::{CommandReply, GateCommand, GateContext};
pub use host::{CommandRegistry, ShellBackupAction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
