//! The verification gate installed in front of the foreign action.

use std::sync::Arc;

use super::slot::{ActionCallback, ActionOutcome, ActionRequest};
use crate::orchestrator::VerificationOrchestrator;
use crate::tree::SharedTree;

pub struct ActionGate {
    orchestrator: Arc<VerificationOrchestrator>,
    tree: SharedTree,
}

impl ActionGate {
    pub fn new(orchestrator: Arc<VerificationOrchestrator>, tree: SharedTree) -> Self {
        ActionGate { orchestrator, tree }
    }

    /// Verify every checkpoint, then either refuse or forward to `original`.
    ///
    /// A forced request with offenders proceeds, and its comment records which
    /// machines were not verifiably off.
    pub fn guard(&self, mut request: ActionRequest, original: &ActionCallback) -> ActionOutcome {
        let summary = self.orchestrator.verify_all(&self.tree);
        if !summary.all_off() {
            let offenders = summary.offender_paths();
            if !request.override_requested {
                log::warn!(
                    "[Gate] Refused action from {}: machines not off ({})",
                    request.source,
                    offenders.join(", ")
                );
                return ActionOutcome::Refused { offenders };
            }
            log::warn!(
                "[Gate] Override by {}: proceeding with machines not off ({})",
                request.source,
                offenders.join(", ")
            );
            request.comment = Some(annotate_comment(request.comment.take(), &offenders));
        }
        original(request)
    }

    /// Build the wrapper callback that gates `original`.
    pub fn wrap(self: &Arc<Self>, original: ActionCallback) -> ActionCallback {
        let gate = Arc::clone(self);
        Arc::new(move |request: ActionRequest| gate.guard(request, &original))
    }
}

/// Append the offender list to an audit comment.
pub fn annotate_comment(comment: Option<String>, offenders: &[String]) -> String {
    let note = format!("forced: machines not off ({})", offenders.join(", "));
    match comment {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim_end(), note),
        _ => note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_comment_appends() {
        let offenders = vec!["farm.iron".to_string(), "tnt".to_string()];
        assert_eq!(
            annotate_comment(Some("nightly".to_string()), &offenders),
            "nightly forced: machines not off (farm.iron, tnt)"
        );
        assert_eq!(annotate_comment(None, &offenders), "forced: machines not off (farm.iron, tnt)");
    }
}
