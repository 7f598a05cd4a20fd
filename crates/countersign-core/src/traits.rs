//! Collaborator traits for the approval engine.
//!
//! The engine owns request state and nothing else. Everything it consults or
//! informs sits behind one of these traits:
//!
//! - `TemplateSource`: the versioned template catalog
//! - `ApproverResolver`: turns a blueprint's resolver reference into people
//! - `FormValidator`: checks form data against a template's form spec
//! - `HistoryLog`: the append-only audit ledger
//! - `Notifier`: outbound events and escalation notices
//!
//! All implementations must be `Send + Sync`: the engine is called from many
//! threads at once and shares these behind `Arc`.

use serde_json::Value;

use countersign_contracts::{
    error::ApprovalResult,
    event::{EscalationNotice, WorkflowEvent},
    history::HistoryEntry,
    ids::{ActorId, RequestId},
    node::ApproverRef,
    template::{ApprovalTemplate, FormReport, FormSpec},
};

/// Where the engine fetches templates from at submission time.
pub trait TemplateSource: Send + Sync {
    /// Return the currently active version of `template_id`.
    ///
    /// Returns `NotFound` when no version exists. A template whose every
    /// version is disabled should be returned anyway (disabled), so the
    /// resolver can report it as `TemplateInvalid`.
    fn active(&self, template_id: &str) -> ApprovalResult<ApprovalTemplate>;
}

/// Resolves a blueprint's `approver_resolver` reference to concrete people.
///
/// Organizational-chart logic lives behind this trait, outside the engine.
/// Resolution happens once, at submission; the result is frozen into the
/// request's nodes.
pub trait ApproverResolver: Send + Sync {
    /// Return the approvers for `reference`. An empty list is not an error
    /// here; the template resolver turns it into `TemplateInvalid`.
    fn resolve(
        &self,
        reference: &str,
        applicant: &ActorId,
        form_data: &Value,
    ) -> ApprovalResult<Vec<ApproverRef>>;
}

/// Validates a request's form data before submission.
pub trait FormValidator: Send + Sync {
    /// Return a report with every failure, or `passed = true`.
    fn validate(&self, spec: &FormSpec, form_data: &Value) -> ApprovalResult<FormReport>;
}

/// The append-only audit ledger.
///
/// Entries are never updated or deleted. Entries for one request are
/// appended in `sequence` order while the engine holds that request's lock.
pub trait HistoryLog: Send + Sync {
    /// Append one entry. A failure aborts the transition that produced it.
    fn append(&self, entry: &HistoryEntry) -> ApprovalResult<()>;

    /// All entries for `request_id` in insertion order.
    fn list(&self, request_id: &RequestId) -> ApprovalResult<Vec<HistoryEntry>>;
}

/// Outbound notification hook.
///
/// Delivery is best-effort: the engine logs errors returned from here and
/// carries on. Implementations may be called more than once for the same
/// escalation and must tolerate it.
pub trait Notifier: Send + Sync {
    fn on_event(&self, _event: &WorkflowEvent) -> ApprovalResult<()> {
        Ok(())
    }

    /// A node's deadline elapsed while it was still open.
    fn on_escalate(&self, notice: &EscalationNotice) -> ApprovalResult<()>;
}

/// Accepts every form. Used when no validator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFormValidator;

impl FormValidator for NoopFormValidator {
    fn validate(&self, _spec: &FormSpec, _form_data: &Value) -> ApprovalResult<FormReport> {
        Ok(FormReport::pass())
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn on_escalate(&self, _notice: &EscalationNotice) -> ApprovalResult<()> {
        Ok(())
    }
}
