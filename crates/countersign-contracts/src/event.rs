//! Outbound notifications.
//!
//! The engine never delivers messages itself. It hands these values to a
//! `Notifier`, and whatever sits behind that trait sends mail, chat
//! messages, or pushes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{ActorId, NodeId, RequestId},
    node::NodeStatus,
    request::RequestStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Submitted {
        request_id: RequestId,
        applicant: ActorId,
    },
    /// A node became the target of approver actions.
    NodeActivated {
        request_id: RequestId,
        node_id: NodeId,
        approvers: Vec<ActorId>,
    },
    NodeClosed {
        request_id: RequestId,
        node_id: NodeId,
        status: NodeStatus,
    },
    Transferred {
        request_id: RequestId,
        node_id: NodeId,
        from: ActorId,
        to: ActorId,
    },
    AddSigned {
        request_id: RequestId,
        node_id: NodeId,
        by: ActorId,
        added: ActorId,
    },
    /// The request reached a terminal status.
    Finished {
        request_id: RequestId,
        status: RequestStatus,
    },
}

/// Delivered when a node's deadline elapses while the node is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub request_id: RequestId,
    pub node_id: NodeId,
    pub node_name: String,
    pub escalate_to: Option<String>,
    /// Approvers who have not decided yet.
    pub waiting_on: Vec<ActorId>,
    pub deadline: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
}
