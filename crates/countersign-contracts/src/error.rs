//! Error types for the approval engine.
//!
//! All fallible operations return `ApprovalResult<T>`. No variant is retried
//! by the engine: each one means caller misuse, stale caller state, or a
//! broken collaborator.

use thiserror::Error;

use crate::{
    ids::{ActorId, NodeId, RequestId},
    request::RequestStatus,
};

/// The unified error type for the approval engine.
#[derive(Debug, Error)]
pub enum ApprovalError {
    // ── validation ───────────────────────────────────────────────────────────
    /// The template cannot be materialized into nodes.
    #[error("template '{template_id}' is invalid: {reason}")]
    TemplateInvalid { template_id: String, reason: String },

    /// The node is not in the active sequence group, or already closed.
    #[error("node {node_id} is not active on request {request_id}")]
    NodeNotActive { request_id: RequestId, node_id: NodeId },

    /// The approver already approved or rejected this node.
    #[error("approver '{actor_id}' has already acted on node {node_id}")]
    DuplicateAction { node_id: NodeId, actor_id: ActorId },

    /// The actor is not (or no longer) an approver of the node.
    #[error("actor '{actor_id}' is not an approver of node {node_id}")]
    NotAssigned { node_id: NodeId, actor_id: ActorId },

    /// A transfer or add-sign targets someone already on the node.
    #[error("approver '{actor_id}' is already assigned to node {node_id}")]
    ApproverAlreadyAssigned { node_id: NodeId, actor_id: ActorId },

    /// The form data does not satisfy the template's form spec.
    #[error("form data rejected: {reason}")]
    FormInvalid { reason: String },

    // ── state ────────────────────────────────────────────────────────────────
    #[error("request {request_id} is {status:?} and accepts no further actions")]
    RequestTerminal { request_id: RequestId, status: RequestStatus },

    #[error("request {request_id} cannot be withdrawn: {reason}")]
    NotWithdrawable { request_id: RequestId, reason: String },

    #[error("request {request_id} has already been submitted")]
    AlreadySubmitted { request_id: RequestId },

    /// Actions on a draft are refused until it is submitted.
    #[error("request {request_id} is still a draft")]
    NotSubmitted { request_id: RequestId },

    // ── lookup ───────────────────────────────────────────────────────────────
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    // ── infrastructure ───────────────────────────────────────────────────────
    /// The history log could not persist an entry.
    ///
    /// Fatal for the action: a transition that cannot be audited is not applied.
    #[error("history write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A configuration document is missing or malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: String },
}

/// Coarse grouping callers use to map errors onto transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller sent something the current state does not allow.
    Validation,
    /// Caller acted on stale information and should refresh.
    State,
    /// 404-equivalent.
    NotFound,
    /// Storage, configuration, or lock failure inside the engine.
    Infrastructure,
}

impl ApprovalError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ApprovalError::TemplateInvalid { .. }
            | ApprovalError::NodeNotActive { .. }
            | ApprovalError::DuplicateAction { .. }
            | ApprovalError::NotAssigned { .. }
            | ApprovalError::ApproverAlreadyAssigned { .. }
            | ApprovalError::FormInvalid { .. } => ErrorClass::Validation,

            ApprovalError::RequestTerminal { .. }
            | ApprovalError::NotWithdrawable { .. }
            | ApprovalError::AlreadySubmitted { .. }
            | ApprovalError::NotSubmitted { .. } => ErrorClass::State,

            ApprovalError::NotFound { .. } => ErrorClass::NotFound,

            ApprovalError::AuditWriteFailed { .. }
            | ApprovalError::ConfigError { .. }
            | ApprovalError::LockPoisoned { .. } => ErrorClass::Infrastructure,
        }
    }

    pub fn request_not_found(id: &RequestId) -> Self {
        ApprovalError::NotFound {
            kind: "request",
            id: id.to_string(),
        }
    }

    pub fn template_not_found(id: &str) -> Self {
        ApprovalError::NotFound {
            kind: "template",
            id: id.to_string(),
        }
    }

    pub(crate) fn poisoned(resource: &str, e: impl std::fmt::Display) -> Self {
        ApprovalError::LockPoisoned {
            resource: format!("{resource}: {e}"),
        }
    }
}

/// Convert a poisoned-lock error into `ApprovalError::LockPoisoned`.
pub fn poisoned<E: std::fmt::Display>(resource: &'static str) -> impl FnOnce(E) -> ApprovalError {
    move |e| ApprovalError::poisoned(resource, e)
}

/// Convenience alias used throughout the countersign crates.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
