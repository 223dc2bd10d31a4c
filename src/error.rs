//! Unified error type hierarchy for Backup Gate
//!
//! Provides structured error handling with TreeError, ProbeError, BridgeError,
//! ConfigError, ConsoleError, and AppError.

use std::io;
use thiserror::Error;

/// Checkpoint tree path and mutation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Wrong node type at '{path}': expected {expected}")]
    WrongType { path: String, expected: &'static str },
}

/// Block state query errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Realm tag outside the fixed set; the channel is never touched
    #[error("Invalid argument: unknown realm '{0}'")]
    InvalidArgument(String),

    /// No response line matched within the timeout (state unknown)
    #[error("No block info response for {coords} within {timeout_ms}ms")]
    Timeout { coords: String, timeout_ms: u64 },

    #[error("Failed to emit query: {0}")]
    Emit(String),
}

/// Foreign entry point takeover errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Foreign component unavailable: {0}")]
    ForeignComponentUnavailable(String),

    #[error("Wrapper was not retained by entry point '{0}'")]
    WrapperNotRetained(String),

    #[error("Entry point '{0}' is not bound")]
    NotBound(String),
}

/// Configuration and document parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Server console plumbing errors.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Failed to spawn server process: {0}")]
    Spawn(String),

    #[error("Console channel closed: {0}")]
    Closed(String),

    #[error("IO error on server console: {0}")]
    Io(#[from] io::Error),
}

/// Global error type for operator-facing operations.
///
/// Every command handler returns `Result<T, AppError>`; `user_message()`
/// is what the operator sees as the rejection reason.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The in-memory change was applied but could not be saved
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Get a user-facing error message suitable for console display
    pub fn user_message(&self) -> String {
        match self {
            AppError::Tree(TreeError::NotFound(path)) => format!("No such checkpoint or group: {}", path),
            AppError::Tree(TreeError::AlreadyExists(id)) => format!("Name already in use: {}", id),
            AppError::Tree(TreeError::WrongType { path, expected }) => {
                format!("'{}' is not a {}", path, expected)
            }
            AppError::Tree(TreeError::InvalidArgument(msg)) => format!("Invalid path or name: {}", msg),
            AppError::Probe(ProbeError::Timeout { coords, .. }) => {
                format!("Could not read block info at {} (no response)", coords)
            }
            AppError::Probe(e) => format!("Block query failed: {}", e),
            AppError::Bridge(e) => format!("Backup command unavailable: {}", e),
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Persistence(msg) => format!("Change applied but not saved: {}", msg),
            AppError::InvalidInput(msg) => format!("Invalid input: {}", msg),
        }
    }
}

/// Top-level result type for the binary entry point.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
