//! Audit trail entries.
//!
//! A `HistoryEntry` is created once per accepted action and never modified.
//! Rejected calls (duplicate approvals, inactive nodes) leave no entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, NodeId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Submit,
    Approve,
    Reject,
    Transfer,
    AddSign,
    Withdraw,
}

impl HistoryAction {
    /// Approve and reject are the decisions an approver can make once per node.
    pub fn is_decision(self) -> bool {
        matches!(self, HistoryAction::Approve | HistoryAction::Reject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the request's history, starting at 0.
    pub sequence: u64,
    pub request_id: RequestId,
    /// Absent for request-level actions (submit, withdraw).
    pub node_id: Option<NodeId>,
    pub actor_id: ActorId,
    pub action: HistoryAction,
    /// The other party of a transfer or add-sign.
    pub target: Option<ActorId>,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}
