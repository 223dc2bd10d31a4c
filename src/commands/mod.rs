//! Operator command handlers.
//!
//! `GateContext` holds everything a handler touches. Every tree mutation is
//! followed by a save, and a handler reports success only once the save went
//! through; a failed save leaves the in-memory change in place and surfaces
//! as `AppError::Persistence`.
//!
//! Handlers block (probes wait on the server), so `run` moves them onto
//! tokio's blocking pool.

pub mod parse;

pub use parse::{parse_gate_command, parse_input, ConsoleInput, GateCommand, ListStyle};

use std::sync::Arc;

use crate::bridge::{ActionCallback, ActionOutcome, ActionRequest, TakeoverBridge};
use crate::config::store::{CheckpointStore, OverrideMode};
use crate::error::{AppError, TreeError};
use crate::host::CommandRegistry;
use crate::models::{Checkpoint, Coords, Realm};
use crate::orchestrator::VerificationOrchestrator;
use crate::tree::{validate_id, Node, SharedTree, TreePath};

/// Lines printed back to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReply {
    pub lines: Vec<String>,
}

impl CommandReply {
    pub fn line(line: impl Into<String>) -> Self {
        CommandReply { lines: vec![line.into()] }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        CommandReply { lines }
    }

    pub fn error(err: &AppError) -> Self {
        CommandReply::line(format!("Error: {}", err.user_message()))
    }
}

const HELP_LINES: &[&str] = &[
    "cp list|ls [tree]                         list checkpoints (flat or as a tree)",
    "cp status|st <path>                       probe a checkpoint or every checkpoint in a group",
    "cp add <x> <y> <z> <name> [world]         register the block's current state as 'off'",
    "cp add-to <group> <x> <y> <z> <name> [world]",
    "cp group <path> [description...]          create a group (and missing parents)",
    "cp update <path>                          re-capture a checkpoint's 'off' state",
    "cp del <path>                             delete a checkpoint or a whole group",
    "make [comment...]                         run the backup (refused unless machines are off)",
    "ignore|ig [comment...]                    run the backup even if machines are on",
    "reload                                    reload the backup command",
    "(checkpoint is accepted wherever cp is)",
];

pub struct GateContext {
    tree: SharedTree,
    store: CheckpointStore,
    override_mode: OverrideMode,
    orchestrator: Arc<VerificationOrchestrator>,
    registry: Arc<CommandRegistry>,
    bridge: Arc<TakeoverBridge>,
    backup_action: ActionCallback,
}

impl GateContext {
    /// # Arguments
    /// * `tree` - Checkpoint tree shared with the gate
    /// * `store` - Where mutations are persisted
    /// * `override_mode` - Written back with every save
    /// * `orchestrator` - Runs probes for status, add and update
    /// * `registry` - Host owning the backup entry point
    /// * `bridge` - Bridge gating the backup entry point
    /// * `backup_action` - Callback registered under the entry point on reload
    pub fn new(
        tree: SharedTree,
        store: CheckpointStore,
        override_mode: OverrideMode,
        orchestrator: Arc<VerificationOrchestrator>,
        registry: Arc<CommandRegistry>,
        bridge: Arc<TakeoverBridge>,
        backup_action: ActionCallback,
    ) -> Self {
        GateContext { tree, store, override_mode, orchestrator, registry, bridge, backup_action }
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// Run `command` on the blocking pool.
    pub async fn run(self: Arc<Self>, command: GateCommand) -> CommandReply {
        match tokio::task::spawn_blocking(move || self.execute(command)).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("[Commands] Handler task failed: {}", e);
                CommandReply::line("Error: command handler crashed, see log")
            }
        }
    }

    /// Run `command` on the calling thread.
    pub fn execute(&self, command: GateCommand) -> CommandReply {
        log::debug!("[Commands] {:?}", command);
        let result = match command {
            GateCommand::Help => Ok(self.help()),
            GateCommand::List(style) => Ok(self.list(style)),
            GateCommand::Status { path } => self.status(&path),
            GateCommand::Delete { path } => self.delete(&path),
            GateCommand::Add { group, name, coords, world } => self.add(&group, &name, coords, world),
            GateCommand::Group { path, description } => self.add_group(&path, description),
            GateCommand::Update { path } => self.update(&path),
            GateCommand::Ignore { comment } => self.run_backup(comment, true),
            GateCommand::Make { comment } => self.run_backup(comment, false),
            GateCommand::Reload => Ok(self.reload()),
        };
        result.unwrap_or_else(|e| {
            log::warn!("[Commands] Rejected: {}", e);
            CommandReply::error(&e)
        })
    }

    pub fn help(&self) -> CommandReply {
        CommandReply::from_lines(HELP_LINES.iter().map(|l| l.to_string()).collect())
    }

    pub fn list(&self, style: ListStyle) -> CommandReply {
        let tree = self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if tree.is_empty() {
            return CommandReply::line("No checkpoints registered");
        }
        let lines = match style {
            ListStyle::Flat => tree
                .checkpoints()
                .iter()
                .enumerate()
                .map(|(index, (path, checkpoint))| format!("[{}] {}: {}", index + 1, path, checkpoint))
                .collect(),
            ListStyle::Tree => tree
                .list()
                .iter()
                .map(|entry| {
                    let indent = "  ".repeat(entry.depth);
                    match entry.node {
                        Node::Group(group) => match &group.description {
                            Some(description) => format!("{}{}/ - {}", indent, entry.id, description),
                            None => format!("{}{}/", indent, entry.id),
                        },
                        Node::Checkpoint(checkpoint) => format!("{}{}: {}", indent, entry.id, checkpoint),
                    }
                })
                .collect(),
        };
        CommandReply::from_lines(lines)
    }

    /// Probe a checkpoint, or every checkpoint below a group.
    pub fn status(&self, path: &str) -> Result<CommandReply, AppError> {
        let group_members = {
            let tree = self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            match tree.resolve_group(path) {
                Ok(_) => {
                    let prefix = format!("{}.", TreePath::parse(path)?);
                    Some(
                        tree.checkpoints()
                            .into_iter()
                            .filter(|(member, _)| member.starts_with(&prefix))
                            .collect::<Vec<_>>(),
                    )
                }
                Err(TreeError::WrongType { .. }) => None,
                Err(e) => return Err(e.into()),
            }
        };

        match group_members {
            Some(members) if members.is_empty() => Ok(CommandReply::line(format!("Group {} has no checkpoints", path))),
            Some(members) => Ok(CommandReply::from_lines(self.orchestrator.verify_checkpoints(&members).render())),
            None => {
                let report = self.orchestrator.verify_single(&self.tree, path)?;
                Ok(CommandReply::from_lines(report.render()))
            }
        }
    }

    pub fn delete(&self, path: &str) -> Result<CommandReply, AppError> {
        let removed = self.mutate(|tree| tree.delete(path))?;
        if removed {
            log::info!("[Commands] Deleted {}", path);
            Ok(CommandReply::line(format!("Deleted {}", path)))
        } else {
            Err(TreeError::NotFound(path.to_string()).into())
        }
    }

    /// Capture the block at `coords` and register it under `group`.
    ///
    /// The name is checked before the probe so a taken name never costs a
    /// server query; the insert re-checks under the write lock.
    pub fn add(&self, group: &str, name: &str, coords: Coords, world: Realm) -> Result<CommandReply, AppError> {
        validate_id(name)?;
        {
            let tree = self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            let siblings = if group.is_empty() {
                tree.root()
            } else {
                &tree.resolve_group(group)?.children
            };
            if siblings.contains(name) {
                let full = if group.is_empty() { name.to_string() } else { format!("{}.{}", group, name) };
                return Err(TreeError::AlreadyExists(full).into());
            }
        }

        let observed = self.orchestrator.capture(coords, world)?;
        let checkpoint = Checkpoint::new(coords, world, observed);
        let description = checkpoint.to_string();
        let path = self.mutate(|tree| tree.insert_checkpoint(group, name, checkpoint))?;
        log::info!("[Commands] Added checkpoint {} at {}", path, description);
        Ok(CommandReply::line(format!("Added {}: {}", path, description)))
    }

    pub fn add_group(&self, path: &str, description: Option<String>) -> Result<CommandReply, AppError> {
        let created = self.mutate(|tree| tree.insert_group(path, description))?;
        Ok(CommandReply::line(match created {
            0 => format!("Group {} already exists", path),
            n => format!("Created group {} ({} new)", path, n),
        }))
    }

    /// Re-capture the expected state of the checkpoint at `path`.
    pub fn update(&self, path: &str) -> Result<CommandReply, AppError> {
        let (coords, world) = {
            let tree = self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            let checkpoint = tree.resolve_checkpoint(path)?;
            (checkpoint.coords(), checkpoint.world)
        };
        let observed = self.orchestrator.capture(coords, world)?;
        let rendered = observed.to_string();
        self.mutate(|tree| {
            tree.resolve_checkpoint_mut(path)?.set_expected(observed);
            Ok(())
        })?;
        log::info!("[Commands] Updated {} to {}", path, rendered);
        Ok(CommandReply::line(format!("Updated {}: {}", path, rendered)))
    }

    fn run_backup(&self, comment: Option<String>, forced: bool) -> Result<CommandReply, AppError> {
        let mut request = ActionRequest::new("console").with_comment(comment);
        if forced {
            request = request.forced();
        }
        let outcome = self.bridge.dispatch(request)?;
        if let ActionOutcome::Failed(reason) = &outcome {
            log::error!("[Commands] Backup failed: {}", reason);
        }
        Ok(CommandReply::from_lines(outcome.render()))
    }

    /// Re-register the backup action, as a reload of its owner would.
    pub fn reload(&self) -> CommandReply {
        let action = Arc::clone(&self.backup_action);
        let fresh: ActionCallback = Arc::new(move |request: ActionRequest| action(request));
        self.registry.register(self.bridge.entry_point(), fresh);
        CommandReply::line(format!("Reloaded '{}'", self.bridge.entry_point()))
    }

    /// Apply `change` under the write lock, then save.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut crate::tree::CheckpointTree) -> Result<T, TreeError>,
    ) -> Result<T, AppError> {
        let mut tree = self.tree.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let value = change(&mut tree)?;
        self.store
            .save_tree(&tree, self.override_mode)
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(value)
    }
}
