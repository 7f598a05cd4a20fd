//! Approval node, approver, and action types.
//!
//! A node is one stage of an approval sequence. Nodes that share a
//! `sequence` number form a parallel group: every node in the group must be
//! approved before the request advances to the next group.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, NodeId};

/// Decision state of a single approver within one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverStatus {
    Pending,
    Approved,
    Rejected,
}

/// An approver bound to a node at submission time (or later via
/// transfer/add-sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub id: ActorId,
    /// Display name, carried for audit readability only.
    pub name: String,
    pub status: ApproverStatus,
}

impl Approver {
    /// A not-yet-decided approver.
    pub fn pending(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            name: name.into(),
            status: ApproverStatus::Pending,
        }
    }
}

/// A reference to a person used in transfer and add-sign payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRef {
    pub id: ActorId,
    pub name: String,
}

impl ApproverRef {
    /// Both arguments are taken as given; ids are not normalized.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            name: name.into(),
        }
    }

    /// Turn this reference into a fresh pending approver.
    pub fn into_approver(self) -> Approver {
        Approver {
            id: self.id,
            name: self.name,
            status: ApproverStatus::Pending,
        }
    }
}

/// How many approvals satisfy a node.
///
/// A single rejection always vetoes the node, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// The first approval closes the node.
    Any,
    /// Every approver must approve.
    All,
    /// Strictly more than half of the approvers must approve.
    Majority,
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet reached: an earlier sequence group is still open.
    Waiting,
    /// Active: approvers may act on it.
    Pending,
    Approved,
    Rejected,
}

/// An action an approver takes against a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    /// Hand the actor's pending decision to someone else.
    Transfer { to: ApproverRef },
    /// Bring in an additional required approver; the actor stays on the node.
    AddSign { approver: ApproverRef },
}

impl Action {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Transfer { .. } => "transfer",
            Action::AddSign { .. } => "add_sign",
        }
    }
}

/// One materialized stage of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNode {
    pub id: NodeId,
    pub name: String,
    /// Nodes that share a sequence number run in parallel.
    pub sequence: u32,
    pub approvers: Vec<Approver>,
    pub policy: ApprovalPolicy,
    pub status: NodeStatus,
    pub deadline: Option<DateTime<Utc>>,
    /// Actor or role notified when the deadline elapses.
    pub escalate_to: Option<String>,
}

impl ApprovalNode {
    /// The approver entry for `id`, if `id` is currently on this node.
    /// Approvers who transferred their decision away are no longer listed.
    pub fn approver(&self, id: &ActorId) -> Option<&Approver> {
        self.approvers.iter().find(|a| &a.id == id)
    }

    /// Whether `id` is currently listed on this node.
    pub fn has_approver(&self, id: &ActorId) -> bool {
        self.approver(id).is_some()
    }

    /// Approvals recorded so far. Policies are evaluated against this and
    /// the current length of `approvers`, which add-sign can grow.
    pub fn approval_count(&self) -> usize {
        self.approvers
            .iter()
            .filter(|a| a.status == ApproverStatus::Approved)
            .count()
    }

    pub fn rejection_count(&self) -> usize {
        self.approvers
            .iter()
            .filter(|a| a.status == ApproverStatus::Rejected)
            .count()
    }
}
