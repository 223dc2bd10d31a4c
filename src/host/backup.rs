//! Shell-backed backup action.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use crate::bridge::{ActionCallback, ActionOutcome, ActionRequest};

/// Runs the configured backup command with the request comment appended as
/// its final argument.
#[derive(Debug, Clone)]
pub struct ShellBackupAction {
    command: Vec<String>,
    working_dir: PathBuf,
}

impl ShellBackupAction {
    pub fn new(command: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        ShellBackupAction { command, working_dir: working_dir.into() }
    }

    /// Full argument vector for `request`.
    pub fn command_line(&self, request: &ActionRequest) -> Vec<String> {
        let mut args = self.command.clone();
        if let Some(comment) = &request.comment {
            args.push(comment.clone());
        }
        args
    }

    pub fn run(&self, request: ActionRequest) -> ActionOutcome {
        let args = self.command_line(&request);
        let Some((program, rest)) = args.split_first() else {
            log::warn!("[Backup] No backup_command configured; nothing to run");
            return ActionOutcome::Failed("no backup command configured".to_string());
        };

        log::info!("[Backup] Starting backup requested by {}: {}", request.source, args.join(" "));
        let output = match Command::new(program).args(rest).current_dir(&self.working_dir).output() {
            Ok(output) => output,
            Err(e) => {
                log::error!("[Backup] Failed to launch '{}': {}", program, e);
                return ActionOutcome::Failed(format!("failed to launch '{}': {}", program, e));
            }
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log::debug!("[Backup] {}", line);
        }
        if output.status.success() {
            log::info!("[Backup] Backup finished");
            ActionOutcome::Completed("Backup finished".to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("").trim().to_string();
            log::error!("[Backup] Backup exited with {}: {}", output.status, reason);
            ActionOutcome::Failed(format!("backup exited with {}", output.status))
        }
    }

    pub fn into_callback(self) -> ActionCallback {
        let action = Arc::new(self);
        Arc::new(move |request: ActionRequest| action.run(request))
    }
}
