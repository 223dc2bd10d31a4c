//! Server console plumbing.
//!
//! The server's console is a single append-only stream of text lines. This
//! module carries it to every interested listener and carries queries back:
//!
//! ```text
//! server stdout ──> [parser] ──> LineHub ──┬──> probe listener
//!                                          └──> other subscribers
//! queries ──> CommandSink ──> server stdin
//! ```
//!
//! `LineHub` fans lines out over crossbeam channels, so a slow subscriber
//! never blocks the reader thread.

pub mod parser;
pub mod process;

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::error::ConsoleError;

pub use parser::parse_server_line;
pub use process::ServerProcess;

/// One line of console output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Text after the log prefix (or the raw line if it had none)
    pub content: String,
    /// True for player chat, which must never be treated as server output
    pub is_user: bool,
}

impl ConsoleLine {
    pub fn system(content: impl Into<String>) -> Self {
        ConsoleLine { content: content.into(), is_user: false }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ConsoleLine { content: content.into(), is_user: true }
    }
}

/// Anything that accepts a console command line.
pub trait CommandSink: Send + Sync {
    fn execute(&self, command: &str) -> Result<(), ConsoleError>;
}

/// Fan-out of console lines to any number of subscribers.
#[derive(Clone, Default)]
pub struct LineHub {
    subscribers: Arc<Mutex<Vec<Sender<ConsoleLine>>>>,
}

impl LineHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Lines published before this call are not replayed.
    pub fn subscribe(&self) -> Receiver<ConsoleLine> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Deliver `line` to every live subscriber, dropping the ones that hung up.
    pub fn publish(&self, line: ConsoleLine) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(line.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop every subscriber sender so their receive loops end.
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}
