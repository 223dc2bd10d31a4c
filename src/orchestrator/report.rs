//! Verification result types.
//!
//! Each type carries a machine-readable form (fields) and a human-readable
//! one (`render`).

use serde::Serialize;

use crate::models::{BlockState, Checkpoint, Coords, Realm};

/// Expected vs. observed state for one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub path: String,
    pub coords: Coords,
    pub world: Realm,
    pub expected: BlockState,
    /// `None` when the probe got no answer
    pub observed: Option<BlockState>,
    pub block_matches: bool,
    pub attributes_match: bool,
}

impl VerificationReport {
    pub fn new(path: impl Into<String>, checkpoint: &Checkpoint, observed: Option<BlockState>) -> Self {
        let expected = checkpoint.expected();
        let (block_matches, attributes_match) = match &observed {
            Some(state) => (state.block == expected.block, state.attributes == expected.attributes),
            None => (false, false),
        };
        VerificationReport {
            path: path.into(),
            coords: checkpoint.coords(),
            world: checkpoint.world,
            expected,
            observed,
            block_matches,
            attributes_match,
        }
    }

    pub fn verified(&self) -> bool {
        self.observed.is_some()
    }

    /// Overall match: a response arrived and both fields agree.
    pub fn matched(&self) -> bool {
        self.verified() && self.block_matches && self.attributes_match
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("{} -> {} {}", self.path, self.world, self.coords)];
        lines.push(format!("  expected: {}", self.expected));
        match &self.observed {
            None => lines.push("  observed: no response, state unknown".to_string()),
            Some(observed) => {
                lines.push(format!("  observed: {}", observed));
                lines.push(format!(
                    "  block: {}  attributes: {}",
                    if self.block_matches { "match" } else { "DIFFERS" },
                    if self.attributes_match { "match" } else { "DIFFERS" }
                ));
            }
        }
        lines.push(if !self.verified() {
            "Could not verify machine state".to_string()
        } else if self.matched() {
            "Machine is off".to_string()
        } else {
            "Machine is ON".to_string()
        });
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffenceKind {
    /// No answer within the timeout
    Unverified,
    /// Answered, but block type or attributes differ
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offender {
    pub path: String,
    pub kind: OffenceKind,
}

/// Aggregate over every checkpoint in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub checked: usize,
    pub offenders: Vec<Offender>,
}

impl VerificationSummary {
    pub fn all_off(&self) -> bool {
        self.offenders.is_empty()
    }

    pub fn offender_paths(&self) -> Vec<String> {
        self.offenders.iter().map(|o| o.path.clone()).collect()
    }

    pub(crate) fn record(&mut self, report: &VerificationReport) {
        self.checked += 1;
        if !report.verified() {
            self.offenders.push(Offender { path: report.path.clone(), kind: OffenceKind::Unverified });
        } else if !report.matched() {
            self.offenders.push(Offender { path: report.path.clone(), kind: OffenceKind::Mismatch });
        }
    }

    pub fn render(&self) -> Vec<String> {
        if self.all_off() {
            return vec![format!("All {} checkpoint(s) report off", self.checked)];
        }
        self.offenders
            .iter()
            .map(|offender| match offender.kind {
                OffenceKind::Unverified => format!("Could not read the state of machine {}", offender.path),
                OffenceKind::Mismatch => format!("Machine {} does not appear to be off", offender.path),
            })
            .collect()
    }
}
