//! Verification Orchestration: probe every checkpoint and aggregate offenders.
//!
//! The orchestrator snapshots the checkpoints under a short read lock and then
//! probes without holding it, so tree reads stay available during a walk.
//! Probes run strictly one after another with a settling delay in between;
//! the probe's own lock keeps concurrent walks from interleaving queries.

pub mod report;

pub use report::{OffenceKind, Offender, VerificationReport, VerificationSummary};

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::{ProbeError, TreeError};
use crate::models::{BlockState, Checkpoint, Coords, Realm};
use crate::probe::StateProbe;
use crate::tree::CheckpointTree;

pub struct VerificationOrchestrator {
    probe: Arc<StateProbe>,
    settle_delay: Duration,
}

impl VerificationOrchestrator {
    /// # Arguments
    /// * `probe` - Shared state probe bound to the server console
    /// * `settle_delay` - Pause between consecutive probes of one walk
    pub fn new(probe: Arc<StateProbe>, settle_delay: Duration) -> Self {
        VerificationOrchestrator { probe, settle_delay }
    }

    pub fn probe(&self) -> &Arc<StateProbe> {
        &self.probe
    }

    /// Probe one checkpoint. A probe error counts as "no response".
    pub fn check(&self, path: &str, checkpoint: &Checkpoint) -> VerificationReport {
        let observed = match self.probe.probe_realm(checkpoint.coords(), checkpoint.world) {
            Ok(result) if result.matched => Some(result.state),
            Ok(_) => None,
            Err(e) => {
                log::warn!("[Verify] Probe for {} failed: {}", path, e);
                None
            }
        };
        VerificationReport::new(path, checkpoint, observed)
    }

    /// Walk the whole tree depth-first and collect offenders.
    pub fn verify_all(&self, tree: &RwLock<CheckpointTree>) -> VerificationSummary {
        let checkpoints = tree.read().unwrap_or_else(|poisoned| poisoned.into_inner()).checkpoints();
        self.verify_checkpoints(&checkpoints)
    }

    pub fn verify_checkpoints(&self, checkpoints: &[(String, Checkpoint)]) -> VerificationSummary {
        let mut summary = VerificationSummary::default();
        for (index, (path, checkpoint)) in checkpoints.iter().enumerate() {
            if index > 0 {
                thread::sleep(self.settle_delay);
            }
            let report = self.check(path, checkpoint);
            summary.record(&report);
        }
        if summary.all_off() {
            log::info!("[Verify] All {} checkpoint(s) report off", summary.checked);
        } else {
            log::warn!(
                "[Verify] {} of {} checkpoint(s) not verifiably off: {}",
                summary.offenders.len(),
                summary.checked,
                summary.offender_paths().join(", ")
            );
        }
        summary
    }

    /// Probe the checkpoint at `path`.
    pub fn verify_single(&self, tree: &RwLock<CheckpointTree>, path: &str) -> Result<VerificationReport, TreeError> {
        let checkpoint = tree
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .resolve_checkpoint(path)?
            .clone();
        Ok(self.check(path, &checkpoint))
    }

    /// Read the current state of a block; a missing answer is an error here.
    pub fn capture(&self, coords: Coords, realm: Realm) -> Result<BlockState, ProbeError> {
        self.probe.capture(coords, realm)
    }
}
