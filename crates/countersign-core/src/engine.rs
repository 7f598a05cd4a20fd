//! The workflow engine: request lifecycle and per-request serialization.
//!
//! Every mutating call follows the same shape:
//!
//!   lock request → validate → copy → evaluate on the copy → append history
//!   → commit copy → (un)register timers → unlock → emit events
//!
//! The copy is only committed after the history log accepted the entry, so a
//! failed append leaves the request exactly as it was. Readers lock the same
//! mutex and clone, so they never see node statuses and `current_node_index`
//! out of step with each other.
//!
//! Lock order is request → scheduler. The scheduler runs callbacks with its
//! own lock released, and callbacks take the request lock, so the two never
//! wait on each other in a cycle.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, Mutex, RwLock, Weak},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use countersign_contracts::{
    error::{poisoned, ApprovalError, ApprovalResult},
    event::{EscalationNotice, WorkflowEvent},
    history::{HistoryAction, HistoryEntry},
    ids::{ActorId, NodeId, RequestId},
    node::{Action, ApprovalNode, ApproverStatus, NodeStatus},
    request::{ApprovalRequest, NewRequest, Priority, RequestState, RequestStatus},
};

use crate::{
    clock::{Clock, SystemClock},
    evaluator::{NodeEvaluator, NodeOutcome},
    resolver::TemplateResolver,
    scheduler::{EscalationCallback, EscalationScheduler},
    traits::{ApproverResolver, FormValidator, HistoryLog, NoopFormValidator, NoopNotifier, Notifier, TemplateSource},
};

type Slot = Arc<Mutex<ApprovalRequest>>;

/// One open node waiting on a given approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxItem {
    pub request_id: RequestId,
    pub node_id: NodeId,
    pub title: String,
    pub node_name: String,
    pub priority: Priority,
    /// The node's own deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// The requester's overall due date, compared after the node deadline.
    pub due_date: Option<DateTime<Utc>>,
}

/// Drives approval requests from draft to a terminal status.
///
/// # Thread safety
///
/// `WorkflowEngine` is `Send + Sync`. Calls on one request are serialized by
/// that request's mutex; calls on different requests run in parallel.
pub struct WorkflowEngine {
    templates: Arc<dyn TemplateSource>,
    approvers: Arc<dyn ApproverResolver>,
    history: Arc<dyn HistoryLog>,
    forms: Arc<dyn FormValidator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<EscalationScheduler>,
    /// The map lock is held only to look up or insert a slot.
    requests: RwLock<HashMap<RequestId, Slot>>,
}

impl WorkflowEngine {
    /// Create an engine with no form validation, no notifications, and the
    /// system clock. Use the `with_*` methods to replace those.
    pub fn new(
        templates: Arc<dyn TemplateSource>,
        approvers: Arc<dyn ApproverResolver>,
        history: Arc<dyn HistoryLog>,
    ) -> Self {
        Self {
            templates,
            approvers,
            history,
            forms: Arc::new(NoopFormValidator),
            notifier: Arc::new(NoopNotifier),
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(EscalationScheduler::new()),
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// Validate form data at submission with `forms`. Only templates that
    /// carry a form spec are checked.
    pub fn with_form_validator(mut self, forms: Arc<dyn FormValidator>) -> Self {
        self.forms = forms;
        self
    }

    /// Send workflow events and escalation notices to `notifier`.
    ///
    /// Notifier errors are logged and never undo a transition.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Take history timestamps, deadlines and `run_escalations` time from
    /// `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The scheduler holding this engine's deadlines, for driving it from an
    /// `EscalationTicker`.
    pub fn scheduler(&self) -> Arc<EscalationScheduler> {
        Arc::clone(&self.scheduler)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Store a new draft. Nothing is resolved until `submit`.
    pub fn create_draft(&self, new: NewRequest) -> ApprovalResult<RequestId> {
        let request = ApprovalRequest::draft(new, self.clock.now());
        let id = request.id;

        info!(
            request_id = %id,
            template_id = %request.template_id,
            applicant = %request.applicant,
            "draft created"
        );

        self.requests
            .write()
            .map_err(poisoned("request index"))?
            .insert(id, Arc::new(Mutex::new(request)));
        Ok(id)
    }

    /// Create a draft and submit it in one call.
    pub fn submit_new(&self, new: NewRequest) -> ApprovalResult<RequestId> {
        let id = self.create_draft(new)?;
        self.submit(&id)
    }

    /// Move a draft to `Pending`.
    ///
    /// Binds the request to the template version active right now,
    /// validates the form data, materializes the nodes, and arms the
    /// deadlines of the first sequence group.
    ///
    /// # Errors
    ///
    /// `AlreadySubmitted` unless the request is a draft; `NotFound` for an
    /// unknown request or template; `FormInvalid`; `TemplateInvalid`;
    /// `AuditWriteFailed`.
    pub fn submit(&self, request_id: &RequestId) -> ApprovalResult<RequestId> {
        let slot = self.slot(request_id)?;
        let mut events = Vec::new();

        {
            let mut request = slot.lock().map_err(poisoned("request"))?;
            if request.status != RequestStatus::Draft {
                warn!(request_id = %request_id, status = ?request.status, "submit refused");
                return Err(ApprovalError::AlreadySubmitted {
                    request_id: *request_id,
                });
            }

            let template = self.templates.active(&request.template_id)?;
            if let Some(form) = &template.form {
                let report = self.forms.validate(form, &request.form_data)?;
                if !report.passed {
                    warn!(request_id = %request_id, failures = %report.summary(), "form rejected");
                    return Err(ApprovalError::FormInvalid {
                        reason: report.summary(),
                    });
                }
            }

            let now = self.clock.now();
            let nodes = TemplateResolver::resolve(
                &template,
                &request.form_data,
                &request.applicant,
                self.approvers.as_ref(),
                now,
            )?;

            let mut next = request.clone();
            next.nodes = nodes;
            next.template_version = Some(template.version);
            next.status = RequestStatus::Pending;
            next.current_node_index = Some(0);
            next.submitted_at = Some(now);

            let applicant = next.applicant.clone();
            self.record(&mut next, None, &applicant, HistoryAction::Submit, None, "", now)?;

            *request = next;

            info!(
                request_id = %request_id,
                template_id = %request.template_id,
                template_version = template.version,
                node_count = request.nodes.len(),
                "request submitted"
            );

            events.push(WorkflowEvent::Submitted {
                request_id: *request_id,
                applicant,
            });
            let range = request.active_range();
            self.activate(&slot, &request, range, &mut events);
        }

        self.emit(events);
        Ok(*request_id)
    }

    /// Apply one approver action to an active node.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotSubmitted`, `RequestTerminal`, `NodeNotActive`, and the
    /// evaluator's `NotAssigned` / `DuplicateAction` /
    /// `ApproverAlreadyAssigned`. A refused call leaves no history entry.
    pub fn process_action(
        &self,
        request_id: &RequestId,
        node_id: &NodeId,
        actor_id: &ActorId,
        action: Action,
        comment: &str,
    ) -> ApprovalResult<RequestState> {
        self.apply_action(request_id, node_id, actor_id, &action, comment)
            .map_err(|e| {
                warn!(
                    request_id = %request_id,
                    node_id = %node_id,
                    actor_id = %actor_id,
                    action = action.label(),
                    error = %e,
                    "action refused"
                );
                e
            })
    }

    fn apply_action(
        &self,
        request_id: &RequestId,
        node_id: &NodeId,
        actor_id: &ActorId,
        action: &Action,
        comment: &str,
    ) -> ApprovalResult<RequestState> {
        let slot = self.slot(request_id)?;
        let mut events = Vec::new();

        let state = {
            let mut request = slot.lock().map_err(poisoned("request"))?;
            Self::ensure_pending(&request)?;

            let group = request.active_range();
            let position = group
                .clone()
                .find(|&i| &request.nodes[i].id == node_id && request.nodes[i].status == NodeStatus::Pending)
                .ok_or(ApprovalError::NodeNotActive {
                    request_id: *request_id,
                    node_id: *node_id,
                })?;

            let now = self.clock.now();
            let mut next = request.clone();
            let evaluation = NodeEvaluator::evaluate(&mut next.nodes[position], actor_id, action)?;

            let (history_action, target) = match action {
                Action::Approve => (HistoryAction::Approve, None),
                Action::Reject => (HistoryAction::Reject, None),
                Action::Transfer { to } => (HistoryAction::Transfer, Some(to.id.clone())),
                Action::AddSign { approver } => (HistoryAction::AddSign, Some(approver.id.clone())),
            };
            self.record(&mut next, Some(*node_id), actor_id, history_action, target, comment, now)?;

            match action {
                Action::Transfer { to } => events.push(WorkflowEvent::Transferred {
                    request_id: *request_id,
                    node_id: *node_id,
                    from: actor_id.clone(),
                    to: to.id.clone(),
                }),
                Action::AddSign { approver } => events.push(WorkflowEvent::AddSigned {
                    request_id: *request_id,
                    node_id: *node_id,
                    by: actor_id.clone(),
                    added: approver.id.clone(),
                }),
                Action::Approve | Action::Reject => {}
            }

            let mut disarm: Vec<NodeId> = Vec::new();
            let mut activate = None;

            match evaluation.outcome {
                NodeOutcome::Pending => {}

                NodeOutcome::Rejected => {
                    // A rejected node ends the whole request. Sibling nodes
                    // keep their status; the request status is authoritative.
                    next.status = RequestStatus::Rejected;
                    next.closed_at = Some(now);
                    disarm.extend(next.nodes.iter().map(|n| n.id));
                    events.push(WorkflowEvent::NodeClosed {
                        request_id: *request_id,
                        node_id: *node_id,
                        status: NodeStatus::Rejected,
                    });
                    events.push(WorkflowEvent::Finished {
                        request_id: *request_id,
                        status: RequestStatus::Rejected,
                    });
                }

                NodeOutcome::Approved => {
                    disarm.push(*node_id);
                    events.push(WorkflowEvent::NodeClosed {
                        request_id: *request_id,
                        node_id: *node_id,
                        status: NodeStatus::Approved,
                    });

                    let group_done = next.nodes[group.clone()]
                        .iter()
                        .all(|n| n.status == NodeStatus::Approved);

                    if group_done {
                        next.current_node_index = Some(group.end);
                        if group.end == next.nodes.len() {
                            next.status = RequestStatus::Approved;
                            next.closed_at = Some(now);
                            events.push(WorkflowEvent::Finished {
                                request_id: *request_id,
                                status: RequestStatus::Approved,
                            });
                        } else {
                            let upcoming = next.active_range();
                            for node in &mut next.nodes[upcoming.clone()] {
                                node.status = NodeStatus::Pending;
                            }
                            activate = Some(upcoming);
                        }
                    }
                }
            }

            *request = next;

            match request.status {
                RequestStatus::Approved => {
                    info!(request_id = %request_id, "request approved");
                }
                RequestStatus::Rejected => {
                    info!(request_id = %request_id, node_id = %node_id, actor_id = %actor_id, "request rejected");
                }
                _ => {
                    debug!(
                        request_id = %request_id,
                        node_id = %node_id,
                        actor_id = %actor_id,
                        action = action.label(),
                        "action applied"
                    );
                }
            }

            self.disarm(&disarm);
            if let Some(range) = activate {
                self.activate(&slot, &request, range, &mut events);
            }

            RequestState::of(&request)
        };

        self.emit(events);
        Ok(state)
    }

    /// Cancel a pending request on behalf of its applicant.
    ///
    /// # Errors
    ///
    /// `NotWithdrawable` unless the request is `Pending` and `actor_id` is the
    /// applicant.
    pub fn withdraw(&self, request_id: &RequestId, actor_id: &ActorId, reason: &str) -> ApprovalResult<()> {
        let slot = self.slot(request_id)?;

        {
            let mut request = slot.lock().map_err(poisoned("request"))?;
            if request.status != RequestStatus::Pending {
                warn!(request_id = %request_id, status = ?request.status, "withdraw refused");
                return Err(ApprovalError::NotWithdrawable {
                    request_id: *request_id,
                    reason: format!("request is {:?}", request.status),
                });
            }
            if &request.applicant != actor_id {
                warn!(request_id = %request_id, actor_id = %actor_id, "withdraw by non-applicant refused");
                return Err(ApprovalError::NotWithdrawable {
                    request_id: *request_id,
                    reason: format!("'{actor_id}' is not the applicant"),
                });
            }

            let now = self.clock.now();
            let mut next = request.clone();
            next.status = RequestStatus::Cancelled;
            next.closed_at = Some(now);
            self.record(&mut next, None, actor_id, HistoryAction::Withdraw, None, reason, now)?;

            *request = next;
            let all: Vec<NodeId> = request.nodes.iter().map(|n| n.id).collect();
            self.disarm(&all);

            info!(request_id = %request_id, reason = %reason, "request withdrawn");
        }

        self.emit(vec![WorkflowEvent::Finished {
            request_id: *request_id,
            status: RequestStatus::Cancelled,
        }]);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// A consistent snapshot of the request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown request.
    pub fn get_state(&self, request_id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        let slot = self.slot(request_id)?;
        let request = slot.lock().map_err(poisoned("request"))?;
        Ok(request.clone())
    }

    /// The request's audit trail as recorded by the history log.
    pub fn list_history(&self, request_id: &RequestId) -> ApprovalResult<Vec<HistoryEntry>> {
        // Unknown requests are NotFound rather than an empty trail.
        self.slot(request_id)?;
        self.history.list(request_id)
    }

    /// Every open node on which `actor_id` still owes a decision.
    ///
    /// Locks each request in turn, so the result is consistent per request
    /// but not across requests.
    pub fn inbox(&self, actor_id: &ActorId) -> ApprovalResult<Vec<InboxItem>> {
        let slots: Vec<Slot> = self
            .requests
            .read()
            .map_err(poisoned("request index"))?
            .values()
            .cloned()
            .collect();

        let mut items = Vec::new();
        for slot in slots {
            let request = slot.lock().map_err(poisoned("request"))?;
            if request.status != RequestStatus::Pending {
                continue;
            }
            for node in request.active_nodes() {
                let owes = node.status == NodeStatus::Pending
                    && node
                        .approver(actor_id)
                        .is_some_and(|a| a.status == ApproverStatus::Pending);
                if owes {
                    items.push(InboxItem {
                        request_id: request.id,
                        node_id: node.id,
                        title: request.title.clone(),
                        node_name: node.name.clone(),
                        priority: request.priority,
                        deadline: node.deadline,
                        due_date: request.deadline_date,
                    });
                }
            }
        }

        // Most urgent first, then node deadline, then the request's due date.
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| earliest_first(a.deadline, b.deadline))
                .then_with(|| earliest_first(a.due_date, b.due_date))
        });
        Ok(items)
    }

    /// Fire every escalation due at the engine clock's current time.
    pub fn run_escalations(&self) -> ApprovalResult<usize> {
        self.scheduler.fire_due(self.clock.now())
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn slot(&self, request_id: &RequestId) -> ApprovalResult<Slot> {
        self.requests
            .read()
            .map_err(poisoned("request index"))?
            .get(request_id)
            .cloned()
            .ok_or_else(|| ApprovalError::request_not_found(request_id))
    }

    fn ensure_pending(request: &ApprovalRequest) -> ApprovalResult<()> {
        if request.status.is_terminal() {
            return Err(ApprovalError::RequestTerminal {
                request_id: request.id,
                status: request.status,
            });
        }
        if request.status == RequestStatus::Draft {
            return Err(ApprovalError::NotSubmitted {
                request_id: request.id,
            });
        }
        Ok(())
    }

    /// Append a history entry to the log, then to the working copy.
    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        next: &mut ApprovalRequest,
        node_id: Option<NodeId>,
        actor_id: &ActorId,
        action: HistoryAction,
        target: Option<ActorId>,
        comment: &str,
        now: DateTime<Utc>,
    ) -> ApprovalResult<()> {
        let entry = HistoryEntry {
            sequence: next.next_history_sequence(),
            request_id: next.id,
            node_id,
            actor_id: actor_id.clone(),
            action,
            target,
            comment: comment.to_string(),
            timestamp: now,
        };
        self.history.append(&entry)?;
        next.history.push(entry);
        Ok(())
    }

    /// Arm deadlines for a freshly activated group and queue its events.
    fn activate(
        &self,
        slot: &Slot,
        request: &ApprovalRequest,
        range: std::ops::Range<usize>,
        events: &mut Vec<WorkflowEvent>,
    ) {
        for node in &request.nodes[range] {
            info!(request_id = %request.id, node_id = %node.id, node = %node.name, "node activated");
            self.arm(slot, request.id, node);
            events.push(WorkflowEvent::NodeActivated {
                request_id: request.id,
                node_id: node.id,
                approvers: node.approvers.iter().map(|a| a.id.clone()).collect(),
            });
        }
    }

    /// Register the node's deadline. Escalation is best-effort, so a
    /// registration failure is logged and the transition stands.
    fn arm(&self, slot: &Slot, request_id: RequestId, node: &ApprovalNode) {
        let Some(deadline) = node.deadline else {
            return;
        };

        let weak = Arc::downgrade(slot);
        let notifier = Arc::clone(&self.notifier);
        let callback: EscalationCallback = Box::new(move |node_id: &NodeId, fired_at: DateTime<Utc>| {
            escalate(&weak, node_id, fired_at, notifier.as_ref())
        });

        if let Err(e) = self.scheduler.register(node.id, deadline, callback) {
            warn!(request_id = %request_id, node_id = %node.id, error = %e, "could not register deadline");
        }
    }

    fn disarm(&self, node_ids: &[NodeId]) {
        for node_id in node_ids {
            if let Err(e) = self.scheduler.cancel(node_id) {
                warn!(node_id = %node_id, error = %e, "could not cancel deadline");
            }
        }
    }

    fn emit(&self, events: Vec<WorkflowEvent>) {
        for event in &events {
            if let Err(e) = self.notifier.on_event(event) {
                warn!(error = %e, event = ?event, "notifier rejected event");
            }
        }
    }
}

/// Dated items sort before undated ones.
fn earliest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Escalation callback body: notify only if the node is still open.
///
/// A timer can be popped by the scheduler just before the node closes; the
/// status re-check under the request lock makes that a no-op.
fn escalate(
    slot: &Weak<Mutex<ApprovalRequest>>,
    node_id: &NodeId,
    fired_at: DateTime<Utc>,
    notifier: &dyn Notifier,
) -> ApprovalResult<()> {
    let Some(slot) = slot.upgrade() else {
        return Ok(());
    };

    let notice = {
        let request = slot.lock().map_err(poisoned("request"))?;
        let Some(node) = request.node(node_id) else {
            return Ok(());
        };
        if request.status != RequestStatus::Pending || node.status != NodeStatus::Pending {
            debug!(request_id = %request.id, node_id = %node_id, "superseded escalation ignored");
            return Ok(());
        }
        let Some(deadline) = node.deadline else {
            return Ok(());
        };

        EscalationNotice {
            request_id: request.id,
            node_id: *node_id,
            node_name: node.name.clone(),
            escalate_to: node.escalate_to.clone(),
            waiting_on: node
                .approvers
                .iter()
                .filter(|a| a.status == ApproverStatus::Pending)
                .map(|a| a.id.clone())
                .collect(),
            deadline,
            fired_at,
        }
    };

    info!(
        request_id = %notice.request_id,
        node_id = %node_id,
        escalate_to = ?notice.escalate_to,
        "escalating overdue node"
    );
    notifier.on_escalate(&notice)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
    };

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    use countersign_contracts::{
        error::{ApprovalError, ApprovalResult},
        event::{EscalationNotice, WorkflowEvent},
        history::{HistoryAction, HistoryEntry},
        ids::{ActorId, NodeId, RequestId},
        node::{Action, ApprovalPolicy, ApproverRef, ApproverStatus, NodeStatus},
        request::{ApprovalRequest, NewRequest, Priority, RequestStatus, RequestType},
        template::{ApprovalTemplate, FormFailure, FormReport, FormSpec, NodeBlueprint},
    };

    use crate::{
        clock::ManualClock,
        traits::{ApproverResolver, FormValidator, HistoryLog, Notifier, TemplateSource},
    };

    use super::{escalate, WorkflowEngine};

    // ── Fakes ────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Catalog(Mutex<HashMap<String, ApprovalTemplate>>);

    impl Catalog {
        fn put(&self, template: ApprovalTemplate) {
            self.0.lock().unwrap().insert(template.id.clone(), template);
        }
    }

    impl TemplateSource for Catalog {
        fn active(&self, template_id: &str) -> ApprovalResult<ApprovalTemplate> {
            self.0
                .lock()
                .unwrap()
                .get(template_id)
                .cloned()
                .ok_or_else(|| ApprovalError::template_not_found(template_id))
        }
    }

    struct Directory;

    impl ApproverResolver for Directory {
        fn resolve(&self, reference: &str, _applicant: &ActorId, _form: &Value) -> ApprovalResult<Vec<ApproverRef>> {
            let ids: &[&str] = match reference {
                "manager" => &["m1"],
                "finance" => &["f1", "f2"],
                "legal" => &["l1"],
                "board" => &["b1", "b2", "b3"],
                _ => &[],
            };
            Ok(ids.iter().map(|id| ApproverRef::new(*id, id.to_uppercase())).collect())
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<HistoryEntry>>,
        fail: AtomicBool,
    }

    impl HistoryLog for MemoryLog {
        fn append(&self, entry: &HistoryEntry) -> ApprovalResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApprovalError::AuditWriteFailed {
                    reason: "disk full".to_string(),
                });
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        fn list(&self, request_id: &RequestId) -> ApprovalResult<Vec<HistoryEntry>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| &e.request_id == request_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<WorkflowEvent>>,
        escalations: Mutex<Vec<EscalationNotice>>,
    }

    impl Notifier for Recorder {
        fn on_event(&self, event: &WorkflowEvent) -> ApprovalResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn on_escalate(&self, notice: &EscalationNotice) -> ApprovalResult<()> {
            self.escalations.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    /// Fails any form without an `amount` field.
    struct AmountRequired;

    impl FormValidator for AmountRequired {
        fn validate(&self, _spec: &FormSpec, form_data: &Value) -> ApprovalResult<FormReport> {
            if form_data.get("amount").is_some() {
                return Ok(FormReport::pass());
            }
            Ok(FormReport {
                passed: false,
                failures: vec![FormFailure {
                    rule_id: "amount-required".to_string(),
                    message: "field 'amount' is missing".to_string(),
                }],
            })
        }
    }

    // ── Harness ──────────────────────────────────────────────────────────────

    struct Harness {
        engine: WorkflowEngine,
        catalog: Arc<Catalog>,
        log: Arc<MemoryLog>,
        notifier: Arc<Recorder>,
        clock: Arc<ManualClock>,
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 6, 9, 0, 0).unwrap()
    }

    fn harness(template: ApprovalTemplate) -> Harness {
        let catalog = Arc::new(Catalog::default());
        catalog.put(template);
        let log = Arc::new(MemoryLog::default());
        let notifier = Arc::new(Recorder::default());
        let clock = Arc::new(ManualClock::new(t0()));

        let engine = WorkflowEngine::new(catalog.clone(), Arc::new(Directory), log.clone())
            .with_notifier(notifier.clone())
            .with_clock(clock.clone());

        Harness {
            engine,
            catalog,
            log,
            notifier,
            clock,
        }
    }

    fn bp(name: &str, sequence: u32, reference: &str, policy: ApprovalPolicy) -> NodeBlueprint {
        NodeBlueprint {
            name: name.to_string(),
            sequence,
            approver_resolver: reference.to_string(),
            policy,
            deadline_hours: None,
            escalate_to: None,
        }
    }

    fn template(nodes: Vec<NodeBlueprint>) -> ApprovalTemplate {
        ApprovalTemplate {
            id: "store-plan".to_string(),
            name: "Store plan".to_string(),
            request_type: RequestType::StorePlan,
            version: 1,
            enabled: true,
            form: None,
            nodes,
        }
    }

    fn new_request() -> NewRequest {
        NewRequest {
            template_id: "store-plan".to_string(),
            title: "Open store #42".to_string(),
            request_type: RequestType::StorePlan,
            business_id: "plan-42".to_string(),
            applicant: ActorId::new("alice"),
            form_data: json!({ "city": "Lyon" }),
            priority: Priority::Medium,
            deadline_date: None,
        }
    }

    fn actor(id: &str) -> ActorId {
        ActorId::new(id)
    }

    fn node_id(h: &Harness, request_id: &RequestId, index: usize) -> NodeId {
        h.engine.get_state(request_id).unwrap().nodes[index].id
    }

    fn approve(h: &Harness, request_id: &RequestId, node: NodeId, who: &str) -> ApprovalResult<countersign_contracts::request::RequestState> {
        h.engine.process_action(request_id, &node, &actor(who), Action::Approve, "ok")
    }

    /// Earlier groups approved, the active group open, later groups waiting.
    fn assert_single_active_stage(request: &ApprovalRequest) {
        assert_eq!(request.status, RequestStatus::Pending);
        let active = request.active_range();
        for (i, node) in request.nodes.iter().enumerate() {
            if i < active.start {
                assert_eq!(node.status, NodeStatus::Approved, "node {i} before active group");
            } else if active.contains(&i) {
                assert!(
                    matches!(node.status, NodeStatus::Pending | NodeStatus::Approved),
                    "node {i} in active group is {:?}",
                    node.status
                );
            } else {
                assert_eq!(node.status, NodeStatus::Waiting, "node {i} after active group");
            }
        }
        assert!(request.active_nodes().iter().any(|n| n.status == NodeStatus::Pending));
    }

    // ── Scenarios ────────────────────────────────────────────────────────────

    #[test]
    fn sequential_nodes_approve_to_completion() {
        let h = harness(template(vec![
            bp("manager", 0, "manager", ApprovalPolicy::Any),
            bp("legal", 1, "legal", ApprovalPolicy::Any),
        ]));
        let id = h.engine.submit_new(new_request()).unwrap();

        let first = node_id(&h, &id, 0);
        let state = approve(&h, &id, first, "m1").unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.current_node_index, Some(1));

        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.nodes[1].status, NodeStatus::Pending);
        assert_eq!(state.active_nodes, vec![request.nodes[1].id]);
        assert_single_active_stage(&request);

        let state = approve(&h, &id, request.nodes[1].id, "l1").unwrap();
        assert_eq!(state.status, RequestStatus::Approved);
        assert_eq!(state.current_node_index, Some(2));
        assert!(state.active_nodes.is_empty());

        let request = h.engine.get_state(&id).unwrap();
        assert!(request.closed_at.is_some());
        assert!(h
            .notifier
            .events
            .lock()
            .unwrap()
            .contains(&WorkflowEvent::Finished {
                request_id: id,
                status: RequestStatus::Approved,
            }));
    }

    #[test]
    fn rejection_on_all_node_ends_request() {
        let h = harness(template(vec![bp("finance", 0, "finance", ApprovalPolicy::All)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        let state = h
            .engine
            .process_action(&id, &node, &actor("f1"), Action::Reject, "budget too high")
            .unwrap();
        assert_eq!(state.status, RequestStatus::Rejected);

        let err = approve(&h, &id, node, "f2").unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::RequestTerminal {
                status: RequestStatus::Rejected,
                ..
            }
        ));
    }

    #[test]
    fn withdrawn_request_refuses_actions() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        h.engine.withdraw(&id, &actor("alice"), "site fell through").unwrap();
        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.status, RequestStatus::Cancelled);

        let last = request.history.last().unwrap();
        assert_eq!(last.action, HistoryAction::Withdraw);
        assert_eq!(last.comment, "site fell through");

        let err = approve(&h, &id, node, "m1").unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::RequestTerminal {
                status: RequestStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn overdue_node_escalates_exactly_once() {
        let mut manager = bp("manager", 0, "manager", ApprovalPolicy::Any);
        manager.deadline_hours = Some(24);
        manager.escalate_to = Some("regional-director".to_string());
        let h = harness(template(vec![manager, bp("legal", 1, "legal", ApprovalPolicy::Any)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        assert_eq!(h.engine.run_escalations().unwrap(), 0);

        h.clock.advance(Duration::hours(25));
        assert_eq!(h.engine.run_escalations().unwrap(), 1);
        {
            let escalations = h.notifier.escalations.lock().unwrap();
            assert_eq!(escalations.len(), 1);
            let notice = &escalations[0];
            assert_eq!(notice.request_id, id);
            assert_eq!(notice.node_id, node);
            assert_eq!(notice.escalate_to.as_deref(), Some("regional-director"));
            assert_eq!(notice.waiting_on, vec![actor("m1")]);
            assert_eq!(notice.deadline, t0() + Duration::hours(24));
        }

        // Escalation changes nothing about the node.
        assert_eq!(h.engine.get_state(&id).unwrap().nodes[0].status, NodeStatus::Pending);

        approve(&h, &id, node, "m1").unwrap();
        h.clock.advance(Duration::hours(48));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);
        assert_eq!(h.notifier.escalations.lock().unwrap().len(), 1);
    }

    #[test]
    fn approval_before_deadline_cancels_escalation() {
        let mut manager = bp("manager", 0, "manager", ApprovalPolicy::Any);
        manager.deadline_hours = Some(8);
        let h = harness(template(vec![manager]));
        let id = h.engine.submit_new(new_request()).unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 1);

        approve(&h, &id, node_id(&h, &id, 0), "m1").unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);

        h.clock.advance(Duration::hours(9));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);
        assert!(h.notifier.escalations.lock().unwrap().is_empty());
    }

    #[test]
    fn superseded_escalation_is_a_no_op() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let id = h.engine.submit_new(new_request()).unwrap();

        let mut closed = h.engine.get_state(&id).unwrap();
        closed.nodes[0].status = NodeStatus::Approved;
        closed.nodes[0].deadline = Some(t0());
        let node = closed.nodes[0].id;
        let slot = Arc::new(Mutex::new(closed));

        let recorder = Recorder::default();
        escalate(&Arc::downgrade(&slot), &node, t0() + Duration::hours(1), &recorder).unwrap();
        assert!(recorder.escalations.lock().unwrap().is_empty());

        drop(slot);
        let gone = Arc::downgrade(&Arc::new(Mutex::new(h.engine.get_state(&id).unwrap())));
        escalate(&gone, &node, t0(), &recorder).unwrap();
        assert!(recorder.escalations.lock().unwrap().is_empty());
    }

    #[test]
    fn deadline_armed_on_group_activation() {
        let mut legal = bp("legal", 1, "legal", ApprovalPolicy::Any);
        legal.deadline_hours = Some(24);
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any), legal]));
        let id = h.engine.submit_new(new_request()).unwrap();

        // The deadline is stamped at submission but not armed while waiting.
        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.nodes[1].deadline, Some(t0() + Duration::hours(24)));
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);
        h.clock.advance(Duration::hours(2));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);

        approve(&h, &id, node_id(&h, &id, 0), "m1").unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 1);
        assert_eq!(
            h.engine.scheduler().next_deadline().unwrap(),
            Some(t0() + Duration::hours(24))
        );

        h.clock.advance(Duration::hours(23));
        assert_eq!(h.engine.run_escalations().unwrap(), 1);
        assert_eq!(h.notifier.escalations.lock().unwrap()[0].node_id, node_id(&h, &id, 1));

        approve(&h, &id, node_id(&h, &id, 1), "l1").unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);
        h.clock.advance(Duration::days(2));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);
    }

    #[test]
    fn rejection_cancels_all_timers() {
        let mut finance = bp("finance", 0, "finance", ApprovalPolicy::All);
        finance.deadline_hours = Some(12);
        let mut legal = bp("legal", 0, "legal", ApprovalPolicy::Any);
        legal.deadline_hours = Some(48);
        let h = harness(template(vec![finance, legal]));
        let id = h.engine.submit_new(new_request()).unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 2);

        h.engine
            .process_action(&id, &node_id(&h, &id, 1), &actor("l1"), Action::Reject, "bad clause")
            .unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);

        h.clock.advance(Duration::days(3));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);
        assert!(h.notifier.escalations.lock().unwrap().is_empty());
    }

    #[test]
    fn withdrawal_cancels_all_timers() {
        let mut manager = bp("manager", 0, "manager", ApprovalPolicy::Any);
        manager.deadline_hours = Some(6);
        let h = harness(template(vec![manager]));
        let id = h.engine.submit_new(new_request()).unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 1);

        h.engine.withdraw(&id, &actor("alice"), "budget frozen").unwrap();
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);

        h.clock.advance(Duration::hours(7));
        assert_eq!(h.engine.run_escalations().unwrap(), 0);
        assert!(h.notifier.escalations.lock().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_deadline_leaves_draft_usable() {
        let mut manager = bp("manager", 0, "manager", ApprovalPolicy::Any);
        manager.deadline_hours = Some(1_000_000_000_000_000);
        let h = harness(template(vec![manager]));
        let id = h.engine.create_draft(new_request()).unwrap();

        assert!(matches!(
            h.engine.submit(&id).unwrap_err(),
            ApprovalError::TemplateInvalid { .. }
        ));

        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.status, RequestStatus::Draft);
        assert!(request.history.is_empty());
        assert_eq!(h.engine.scheduler().pending().unwrap(), 0);

        // Fix the template; the same draft submits cleanly.
        h.catalog.put(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        h.engine.submit(&id).unwrap();
        assert_eq!(h.engine.get_state(&id).unwrap().status, RequestStatus::Pending);
    }

    // ── Properties ───────────────────────────────────────────────────────────

    #[test]
    fn parallel_group_waits_for_every_node() {
        let h = harness(template(vec![
            bp("manager", 0, "manager", ApprovalPolicy::Any),
            bp("finance", 1, "finance", ApprovalPolicy::Any),
            bp("legal", 1, "legal", ApprovalPolicy::Any),
        ]));
        let id = h.engine.submit_new(new_request()).unwrap();
        approve(&h, &id, node_id(&h, &id, 0), "m1").unwrap();

        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.active_range(), 1..3);
        assert_single_active_stage(&request);
        let (finance, legal) = (request.nodes[1].id, request.nodes[2].id);

        let state = approve(&h, &id, finance, "f2").unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.current_node_index, Some(1));
        assert_eq!(state.active_nodes, vec![legal]);
        assert_single_active_stage(&h.engine.get_state(&id).unwrap());

        // A closed sibling no longer accepts actions.
        let err = approve(&h, &id, finance, "f1").unwrap_err();
        assert!(matches!(err, ApprovalError::NodeNotActive { .. }));

        let state = approve(&h, &id, legal, "l1").unwrap();
        assert_eq!(state.status, RequestStatus::Approved);
        assert_eq!(state.current_node_index, Some(3));
    }

    #[test]
    fn waiting_node_is_not_active() {
        let h = harness(template(vec![
            bp("manager", 0, "manager", ApprovalPolicy::Any),
            bp("legal", 1, "legal", ApprovalPolicy::Any),
        ]));
        let id = h.engine.submit_new(new_request()).unwrap();

        let err = approve(&h, &id, node_id(&h, &id, 1), "l1").unwrap_err();
        assert!(matches!(err, ApprovalError::NodeNotActive { .. }));

        let err = approve(&h, &id, NodeId::new(), "m1").unwrap_err();
        assert!(matches!(err, ApprovalError::NodeNotActive { .. }));
    }

    #[test]
    fn second_decision_is_refused_without_history() {
        let h = harness(template(vec![bp("board", 0, "board", ApprovalPolicy::All)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        approve(&h, &id, node, "b1").unwrap();
        let err = approve(&h, &id, node, "b1").unwrap_err();
        assert!(matches!(err, ApprovalError::DuplicateAction { .. }));
        let err = h
            .engine
            .process_action(&id, &node, &actor("b1"), Action::Reject, "changed my mind")
            .unwrap_err();
        assert!(matches!(err, ApprovalError::DuplicateAction { .. }));

        let decisions = h
            .engine
            .list_history(&id)
            .unwrap()
            .into_iter()
            .filter(|e| e.action.is_decision() && e.actor_id == actor("b1"))
            .count();
        assert_eq!(decisions, 1);
    }

    #[test]
    fn all_policy_closes_on_last_approval() {
        let h = harness(template(vec![bp("board", 0, "board", ApprovalPolicy::All)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        let state = approve(&h, &id, node, "b1").unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        let state = approve(&h, &id, node, "b2").unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.active_nodes, vec![node]);
        let state = approve(&h, &id, node, "b3").unwrap();
        assert_eq!(state.status, RequestStatus::Approved);
    }

    #[test]
    fn rejection_in_parallel_group_leaves_sibling_untouched() {
        let h = harness(template(vec![
            bp("finance", 0, "finance", ApprovalPolicy::Any),
            bp("legal", 0, "legal", ApprovalPolicy::Any),
            bp("board", 1, "board", ApprovalPolicy::Majority),
        ]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let legal = node_id(&h, &id, 1);

        let state = h
            .engine
            .process_action(&id, &legal, &actor("l1"), Action::Reject, "clause 7")
            .unwrap();
        assert_eq!(state.status, RequestStatus::Rejected);
        assert!(state.active_nodes.is_empty());

        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.nodes[0].status, NodeStatus::Pending);
        assert_eq!(request.nodes[1].status, NodeStatus::Rejected);
        assert_eq!(request.nodes[2].status, NodeStatus::Waiting);

        let err = approve(&h, &id, request.nodes[0].id, "f1").unwrap_err();
        assert!(matches!(err, ApprovalError::RequestTerminal { .. }));
    }

    #[test]
    fn history_only_grows() {
        let h = harness(template(vec![
            bp("manager", 0, "manager", ApprovalPolicy::Any),
            bp("board", 1, "board", ApprovalPolicy::Majority),
        ]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let mut previous = h.engine.list_history(&id).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].action, HistoryAction::Submit);

        let manager = node_id(&h, &id, 0);
        let board = node_id(&h, &id, 1);
        let steps: Vec<(NodeId, &str)> = vec![(manager, "m1"), (manager, "m1"), (board, "b1"), (board, "b3")];
        for (node, who) in steps {
            let _ = approve(&h, &id, node, who);
            let current = h.engine.list_history(&id).unwrap();
            assert!(current.len() >= previous.len());
            assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }

        let sequences: Vec<u64> = previous.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
        assert_eq!(h.engine.get_state(&id).unwrap().history, previous);
    }

    // ── Transfer and add-sign ────────────────────────────────────────────────

    #[test]
    fn transfer_and_add_sign_are_recorded() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        h.engine
            .process_action(
                &id,
                &node,
                &actor("m1"),
                Action::Transfer {
                    to: ApproverRef::new("m2", "Deputy"),
                },
                "on leave",
            )
            .unwrap();
        let err = approve(&h, &id, node, "m1").unwrap_err();
        assert!(matches!(err, ApprovalError::NotAssigned { .. }));

        let state = h
            .engine
            .process_action(
                &id,
                &node,
                &actor("m2"),
                Action::AddSign {
                    approver: ApproverRef::new("l1", "Legal"),
                },
                "",
            )
            .unwrap();
        assert_eq!(state.status, RequestStatus::Pending);

        let history = h.engine.list_history(&id).unwrap();
        assert_eq!(history[1].action, HistoryAction::Transfer);
        assert_eq!(history[1].target, Some(actor("m2")));
        assert_eq!(history[1].comment, "on leave");
        assert_eq!(history[2].action, HistoryAction::AddSign);
        assert_eq!(history[2].actor_id, actor("m2"));
        assert_eq!(history[2].target, Some(actor("l1")));

        let state = approve(&h, &id, node, "l1").unwrap();
        assert_eq!(state.status, RequestStatus::Approved);

        let events = h.notifier.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, WorkflowEvent::Transferred { to, .. } if *to == actor("m2"))));
        assert!(events.iter().any(|e| matches!(e, WorkflowEvent::AddSigned { added, .. } if *added == actor("l1"))));
    }

    // ── Lifecycle errors ─────────────────────────────────────────────────────

    #[test]
    fn draft_has_no_nodes_until_submitted() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let id = h.engine.create_draft(new_request()).unwrap();

        let draft = h.engine.get_state(&id).unwrap();
        assert_eq!(draft.status, RequestStatus::Draft);
        assert_eq!(draft.current_node_index, None);
        assert!(draft.nodes.is_empty());

        let err = approve(&h, &id, NodeId::new(), "m1").unwrap_err();
        assert!(matches!(err, ApprovalError::NotSubmitted { .. }));

        h.engine.submit(&id).unwrap();
        let err = h.engine.submit(&id).unwrap_err();
        assert!(matches!(err, ApprovalError::AlreadySubmitted { .. }));
        assert_eq!(h.engine.list_history(&id).unwrap().len(), 1);
    }

    #[test]
    fn unknown_request_and_template_are_not_found() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let missing = RequestId::new();

        assert!(matches!(
            h.engine.get_state(&missing).unwrap_err(),
            ApprovalError::NotFound { kind: "request", .. }
        ));
        assert!(matches!(
            h.engine.list_history(&missing).unwrap_err(),
            ApprovalError::NotFound { .. }
        ));
        assert!(matches!(
            approve(&h, &missing, NodeId::new(), "m1").unwrap_err(),
            ApprovalError::NotFound { .. }
        ));

        let mut new = new_request();
        new.template_id = "no-such-template".to_string();
        let id = h.engine.create_draft(new).unwrap();
        assert!(matches!(
            h.engine.submit(&id).unwrap_err(),
            ApprovalError::NotFound { kind: "template", .. }
        ));
        assert_eq!(h.engine.get_state(&id).unwrap().status, RequestStatus::Draft);
    }

    #[test]
    fn only_applicant_may_withdraw_pending_request() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let draft = h.engine.create_draft(new_request()).unwrap();
        assert!(matches!(
            h.engine.withdraw(&draft, &actor("alice"), "").unwrap_err(),
            ApprovalError::NotWithdrawable { .. }
        ));

        let id = h.engine.submit_new(new_request()).unwrap();
        assert!(matches!(
            h.engine.withdraw(&id, &actor("m1"), "not mine").unwrap_err(),
            ApprovalError::NotWithdrawable { .. }
        ));
        assert_eq!(h.engine.get_state(&id).unwrap().status, RequestStatus::Pending);

        approve(&h, &id, node_id(&h, &id, 0), "m1").unwrap();
        assert!(matches!(
            h.engine.withdraw(&id, &actor("alice"), "too late").unwrap_err(),
            ApprovalError::NotWithdrawable { .. }
        ));
    }

    #[test]
    fn invalid_form_blocks_submission() {
        let mut t = template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]);
        t.form = Some(FormSpec::default());
        let mut h = harness(t);
        h.engine = h.engine.with_form_validator(Arc::new(AmountRequired));

        let id = h.engine.create_draft(new_request()).unwrap();
        match h.engine.submit(&id).unwrap_err() {
            ApprovalError::FormInvalid { reason } => assert!(reason.contains("amount-required"), "{reason}"),
            other => panic!("expected FormInvalid, got {other:?}"),
        }
        assert_eq!(h.engine.get_state(&id).unwrap().status, RequestStatus::Draft);
        assert!(h.engine.list_history(&id).unwrap().is_empty());

        let mut ok = new_request();
        ok.form_data = json!({ "amount": 1200 });
        h.engine.submit_new(ok).unwrap();
    }

    #[test]
    fn failed_history_append_leaves_state_untouched() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);
        let before = h.engine.get_state(&id).unwrap();

        h.log.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            approve(&h, &id, node, "m1").unwrap_err(),
            ApprovalError::AuditWriteFailed { .. }
        ));

        let after = h.engine.get_state(&id).unwrap();
        assert_eq!(after.status, RequestStatus::Pending);
        assert_eq!(after.nodes, before.nodes);
        assert_eq!(after.history.len(), 1);

        h.log.fail.store(false, Ordering::SeqCst);
        assert_eq!(approve(&h, &id, node, "m1").unwrap().status, RequestStatus::Approved);
    }

    #[test]
    fn in_flight_request_keeps_its_template_version() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let old = h.engine.submit_new(new_request()).unwrap();

        let mut v2 = template(vec![
            bp("manager", 0, "manager", ApprovalPolicy::Any),
            bp("legal", 1, "legal", ApprovalPolicy::Any),
        ]);
        v2.version = 2;
        h.catalog.put(v2);
        let new = h.engine.submit_new(new_request()).unwrap();

        let old = h.engine.get_state(&old).unwrap();
        assert_eq!(old.template_version, Some(1));
        assert_eq!(old.nodes.len(), 1);
        let new = h.engine.get_state(&new).unwrap();
        assert_eq!(new.template_version, Some(2));
        assert_eq!(new.nodes.len(), 2);
    }

    #[test]
    fn inbox_lists_open_decisions_by_priority() {
        let h = harness(template(vec![
            bp("finance", 0, "finance", ApprovalPolicy::All),
            bp("board", 1, "board", ApprovalPolicy::Any),
        ]));
        let low = h.engine.submit_new(new_request()).unwrap();
        let mut urgent = new_request();
        urgent.priority = Priority::Urgent;
        let urgent = h.engine.submit_new(urgent).unwrap();

        let inbox = h.engine.inbox(&actor("f1")).unwrap();
        let ids: Vec<RequestId> = inbox.iter().map(|i| i.request_id).collect();
        assert_eq!(ids, vec![urgent, low]);
        assert_eq!(inbox[0].node_name, "finance");

        approve(&h, &urgent, node_id(&h, &urgent, 0), "f1").unwrap();
        let inbox = h.engine.inbox(&actor("f1")).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].request_id, low);

        assert!(h.engine.inbox(&actor("b1")).unwrap().is_empty());
    }

    #[test]
    fn inbox_breaks_ties_on_request_due_date() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let undated = h.engine.submit_new(new_request()).unwrap();
        let mut later = new_request();
        later.deadline_date = Some(t0() + Duration::days(10));
        let later = h.engine.submit_new(later).unwrap();
        let mut sooner = new_request();
        sooner.deadline_date = Some(t0() + Duration::days(3));
        let sooner = h.engine.submit_new(sooner).unwrap();

        let inbox = h.engine.inbox(&actor("m1")).unwrap();
        let ids: Vec<RequestId> = inbox.iter().map(|i| i.request_id).collect();
        assert_eq!(ids, vec![sooner, later, undated]);
        assert_eq!(inbox[0].due_date, Some(t0() + Duration::days(3)));
    }

    // ── Concurrency ──────────────────────────────────────────────────────────

    #[test]
    fn concurrent_approvals_count_once_each() {
        let h = harness(template(vec![bp("board", 0, "board", ApprovalPolicy::All)]));
        let id = h.engine.submit_new(new_request()).unwrap();
        let node = node_id(&h, &id, 0);

        let results: Vec<ApprovalResult<_>> = std::thread::scope(|s| {
            let handles: Vec<_> = ["b1", "b2", "b3", "b1", "b2", "b3"]
                .into_iter()
                .map(|who| {
                    let h = &h;
                    s.spawn(move || approve(h, &id, node, who))
                })
                .collect();
            handles.into_iter().map(|t| t.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 3);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(
                matches!(
                    err,
                    ApprovalError::DuplicateAction { .. }
                        | ApprovalError::NodeNotActive { .. }
                        | ApprovalError::RequestTerminal { .. }
                ),
                "unexpected {err:?}"
            );
        }

        let request = h.engine.get_state(&id).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.nodes[0].approvers.iter().all(|a| a.status == ApproverStatus::Approved));
        let decisions = h.log.list(&id).unwrap().iter().filter(|e| e.action.is_decision()).count();
        assert_eq!(decisions, 3);
    }

    #[test]
    fn independent_requests_proceed_in_parallel() {
        let h = harness(template(vec![bp("manager", 0, "manager", ApprovalPolicy::Any)]));
        let ids: Vec<RequestId> = (0..8).map(|_| h.engine.submit_new(new_request()).unwrap()).collect();

        std::thread::scope(|s| {
            for id in &ids {
                let h = &h;
                s.spawn(move || {
                    let node = node_id(h, id, 0);
                    approve(h, id, node, "m1").unwrap();
                });
            }
        });

        for id in &ids {
            assert_eq!(h.engine.get_state(id).unwrap().status, RequestStatus::Approved);
        }
    }
}
