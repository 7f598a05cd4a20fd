//! Node evaluation: applies one approver action to one node.
//!
//! The evaluator is pure apart from mutating the node it is handed. It
//! makes no cross-node decisions; advancing the request is the engine's job.
//! The caller must have checked that the node is active.

use serde::{Deserialize, Serialize};
use tracing::debug;

use countersign_contracts::{
    error::{ApprovalError, ApprovalResult},
    ids::ActorId,
    node::{Action, ApprovalNode, ApprovalPolicy, ApproverRef, ApproverStatus, NodeStatus},
};

/// Where a node stands after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Still open.
    Pending,
    Approved,
    Rejected,
}

/// Result of one `NodeEvaluator::evaluate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// The acting approver's status afterwards. `None` after a transfer,
    /// which removes the actor from the node.
    pub approver_status: Option<ApproverStatus>,
    pub outcome: NodeOutcome,
}

pub struct NodeEvaluator;

impl NodeEvaluator {
    /// Apply `action` by `approver_id` to `node`.
    ///
    /// # Errors
    ///
    /// - `NotAssigned` if the actor is not on the node (including an approver
    ///   who transferred their decision away)
    /// - `DuplicateAction` if the actor already approved or rejected
    /// - `ApproverAlreadyAssigned` if a transfer or add-sign names someone
    ///   already on the node
    ///
    /// On error the node is left untouched.
    pub fn evaluate(
        node: &mut ApprovalNode,
        approver_id: &ActorId,
        action: &Action,
    ) -> ApprovalResult<Evaluation> {
        let position = node
            .approvers
            .iter()
            .position(|a| &a.id == approver_id)
            .ok_or_else(|| ApprovalError::NotAssigned {
                node_id: node.id,
                actor_id: approver_id.clone(),
            })?;

        if node.approvers[position].status != ApproverStatus::Pending {
            return Err(ApprovalError::DuplicateAction {
                node_id: node.id,
                actor_id: approver_id.clone(),
            });
        }

        let approver_status = match action {
            Action::Approve => {
                node.approvers[position].status = ApproverStatus::Approved;
                Some(ApproverStatus::Approved)
            }
            Action::Reject => {
                node.approvers[position].status = ApproverStatus::Rejected;
                Some(ApproverStatus::Rejected)
            }
            Action::Transfer { to } => {
                Self::ensure_unassigned(node, to)?;
                // The newcomer takes the actor's slot so approver order is kept.
                node.approvers[position] = to.clone().into_approver();
                None
            }
            Action::AddSign { approver } => {
                Self::ensure_unassigned(node, approver)?;
                node.approvers.push(approver.clone().into_approver());
                Some(ApproverStatus::Pending)
            }
        };

        let outcome = Self::outcome(node);
        node.status = match outcome {
            NodeOutcome::Pending => NodeStatus::Pending,
            NodeOutcome::Approved => NodeStatus::Approved,
            NodeOutcome::Rejected => NodeStatus::Rejected,
        };

        debug!(
            node_id = %node.id,
            actor_id = %approver_id,
            action = action.label(),
            approvals = node.approval_count(),
            approvers = node.approvers.len(),
            outcome = ?outcome,
            "node evaluated"
        );

        Ok(Evaluation {
            approver_status,
            outcome,
        })
    }

    /// Compute the outcome from the approvers' current statuses.
    ///
    /// Any rejection vetoes the node. Otherwise the policy decides.
    pub fn outcome(node: &ApprovalNode) -> NodeOutcome {
        if node.rejection_count() > 0 {
            return NodeOutcome::Rejected;
        }

        let approvals = node.approval_count();
        let total = node.approvers.len();
        let satisfied = match node.policy {
            ApprovalPolicy::Any => approvals >= 1,
            ApprovalPolicy::All => total > 0 && approvals == total,
            ApprovalPolicy::Majority => approvals * 2 > total,
        };

        if satisfied {
            NodeOutcome::Approved
        } else {
            NodeOutcome::Pending
        }
    }

    fn ensure_unassigned(node: &ApprovalNode, candidate: &ApproverRef) -> ApprovalResult<()> {
        if node.has_approver(&candidate.id) {
            return Err(ApprovalError::ApproverAlreadyAssigned {
                node_id: node.id,
                actor_id: candidate.id.clone(),
            });
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
