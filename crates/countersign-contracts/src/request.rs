//! Approval request types.
//!
//! `ApprovalRequest` is the unit of work the engine drives. It owns its nodes
//! and its history; nothing else holds a mutable reference to either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    history::HistoryEntry,
    ids::{ActorId, NodeId, RequestId},
    node::{ApprovalNode, NodeStatus},
};

/// The business category of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    StorePlan,
    Expense,
    Contract,
    Leave,
    Purchase,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Request lifecycle: `Draft → Pending → {Approved | Rejected | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    /// Terminal requests are immutable.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Approved | RequestStatus::Rejected | RequestStatus::Cancelled
        )
    }
}

/// Caller-supplied fields for a new request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub template_id: String,
    pub title: String,
    pub request_type: RequestType,
    /// Opaque reference to the entity being approved (store plan, contract, ...).
    pub business_id: String,
    pub applicant: ActorId,
    /// Opaque payload. Only the template's form spec, if any, looks inside.
    pub form_data: serde_json::Value,
    pub priority: Priority,
    pub deadline_date: Option<DateTime<Utc>>,
}

/// One business request travelling through its approval nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub title: String,
    pub request_type: RequestType,
    pub business_id: String,
    pub applicant: ActorId,
    pub template_id: String,
    /// Template version the nodes were materialized from. `None` while draft.
    pub template_version: Option<u32>,
    pub form_data: serde_json::Value,
    pub priority: Priority,
    pub deadline_date: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    /// Frozen at submission.
    pub nodes: Vec<ApprovalNode>,
    /// Index of the first node of the active sequence group.
    ///
    /// `None` before submission, `Some(nodes.len())` once fully approved.
    pub current_node_index: Option<usize>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Build a draft from caller input.
    pub fn draft(new: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            title: new.title,
            request_type: new.request_type,
            business_id: new.business_id,
            applicant: new.applicant,
            template_id: new.template_id,
            template_version: None,
            form_data: new.form_data,
            priority: new.priority,
            deadline_date: new.deadline_date,
            status: RequestStatus::Draft,
            nodes: Vec::new(),
            current_node_index: None,
            history: Vec::new(),
            created_at: now,
            submitted_at: None,
            closed_at: None,
        }
    }

    /// Index range of the active sequence group, or an empty range when no
    /// group is active.
    pub fn active_range(&self) -> std::ops::Range<usize> {
        let Some(start) = self.current_node_index else {
            return 0..0;
        };
        let Some(first) = self.nodes.get(start) else {
            return start..start;
        };
        let sequence = first.sequence;
        let len = self.nodes[start..]
            .iter()
            .take_while(|n| n.sequence == sequence)
            .count();
        start..start + len
    }

    /// Nodes of the active sequence group.
    pub fn active_nodes(&self) -> &[ApprovalNode] {
        &self.nodes[self.active_range()]
    }

    pub fn node(&self, id: &NodeId) -> Option<&ApprovalNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The active group's nodes that are still open.
    pub fn pending_node_ids(&self) -> Vec<NodeId> {
        self.active_nodes()
            .iter()
            .filter(|n| n.status == NodeStatus::Pending)
            .map(|n| n.id)
            .collect()
    }

    /// Sequence number the next history entry must carry.
    pub fn next_history_sequence(&self) -> u64 {
        self.history.len() as u64
    }
}

/// What `process_action` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestState {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub current_node_index: Option<usize>,
    /// Nodes of the active group still awaiting decisions.
    pub active_nodes: Vec<NodeId>,
}

impl RequestState {
    pub fn of(request: &ApprovalRequest) -> Self {
        let active_nodes = if request.status == RequestStatus::Pending {
            request.pending_node_ids()
        } else {
            Vec::new()
        };
        Self {
            request_id: request.id,
            status: request.status,
            current_node_index: request.current_node_index,
            active_nodes,
        }
    }
}
