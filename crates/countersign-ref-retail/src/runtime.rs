//! Wiring of real COUNTERSIGN components for the retail scenarios.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use countersign_audit::InMemoryHistoryLog;
use countersign_contracts::{
    error::{poisoned, ApprovalError, ApprovalResult},
    event::{EscalationNotice, WorkflowEvent},
    ids::{NodeId, RequestId},
    request::{RequestState, RequestStatus},
};
use countersign_core::{clock::ManualClock, traits::Notifier, WorkflowEngine};
use countersign_forms::SchemaFormValidator;
use countersign_templates::{CatalogConfig, StaticApproverResolver, TemplateCatalog};

use crate::mock_data;

pub const RETAIL_CATALOG: &str = include_str!("../templates/retail.toml");

/// Collects every notification and prints escalations as they arrive.
#[derive(Default)]
pub struct ConsoleNotifier {
    events: Mutex<Vec<WorkflowEvent>>,
    escalations: Mutex<Vec<EscalationNotice>>,
}

impl ConsoleNotifier {
    pub fn events(&self) -> ApprovalResult<Vec<WorkflowEvent>> {
        Ok(self.events.lock().map_err(poisoned("notifier events"))?.clone())
    }

    pub fn escalations(&self) -> ApprovalResult<Vec<EscalationNotice>> {
        Ok(self.escalations.lock().map_err(poisoned("notifier escalations"))?.clone())
    }
}

impl Notifier for ConsoleNotifier {
    fn on_event(&self, event: &WorkflowEvent) -> ApprovalResult<()> {
        self.events.lock().map_err(poisoned("notifier events"))?.push(event.clone());
        Ok(())
    }

    fn on_escalate(&self, notice: &EscalationNotice) -> ApprovalResult<()> {
        println!(
            "  !! ESCALATION: '{}' overdue since {} -> notify {} (waiting on {})",
            notice.node_name,
            notice.deadline.format("%Y-%m-%d %H:%M"),
            notice.escalate_to.as_deref().unwrap_or("nobody"),
            notice
                .waiting_on
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.escalations
            .lock()
            .map_err(poisoned("notifier escalations"))?
            .push(notice.clone());
        Ok(())
    }
}

/// What a scenario run ended with, for the CLI summary and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub history_len: usize,
    pub chain_verified: bool,
    pub escalations: usize,
}

/// One engine over the retail catalog, with a manual clock so deadlines can
/// be made to elapse.
pub struct RetailRuntime {
    pub engine: WorkflowEngine,
    pub history: Arc<InMemoryHistoryLog>,
    pub catalog: Arc<TemplateCatalog>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<ConsoleNotifier>,
}

impl RetailRuntime {
    pub fn new() -> ApprovalResult<Self> {
        let config = CatalogConfig::from_toml_str(RETAIL_CATALOG)?;
        let catalog = Arc::new(TemplateCatalog::from_config(&config)?);
        let directory = Arc::new(StaticApproverResolver::from_config(&config));
        let history = Arc::new(InMemoryHistoryLog::new());
        let clock = Arc::new(ManualClock::new(monday_morning()));
        let notifier = Arc::new(ConsoleNotifier::default());

        let mut forms = SchemaFormValidator::new();
        forms.register_rule("receipts-attached", Box::new(mock_data::receipts_attached));

        let engine = WorkflowEngine::new(catalog.clone(), directory, history.clone())
            .with_form_validator(Arc::new(forms))
            .with_notifier(notifier.clone())
            .with_clock(clock.clone());

        info!(
            templates = config.templates.len(),
            groups = config.approvers.len(),
            "retail runtime ready"
        );

        Ok(Self {
            engine,
            history,
            catalog,
            clock,
            notifier,
        })
    }

    /// Id of the node at `index` in the request's frozen sequence.
    pub fn node(&self, request_id: &RequestId, index: usize) -> ApprovalResult<NodeId> {
        self.engine
            .get_state(request_id)?
            .nodes
            .get(index)
            .map(|n| n.id)
            .ok_or_else(|| ApprovalError::NotFound {
                kind: "node",
                id: format!("{request_id}#{index}"),
            })
    }

    /// Print the request's history and chain status, and summarize it.
    pub fn finish(&self, request_id: &RequestId) -> ApprovalResult<ScenarioOutcome> {
        let request = self.engine.get_state(request_id)?;
        let history = self.engine.list_history(request_id)?;
        let chain_verified = self.history.verify_integrity(request_id)?;
        let trail = self.history.export_trail(request_id)?;

        println!("  History:");
        for entry in &history {
            let target = entry
                .target
                .as_ref()
                .map(|t| format!(" -> {t}"))
                .unwrap_or_default();
            println!(
                "    #{} {:<9} by {}{}{}",
                entry.sequence,
                format!("{:?}", entry.action),
                entry.actor_id,
                target,
                if entry.comment.is_empty() {
                    String::new()
                } else {
                    format!("  \"{}\"", entry.comment)
                }
            );
        }
        println!("  Final status:   {:?}", request.status);
        println!(
            "  Audit chain:    {} ({} event(s), head {})",
            if chain_verified { "VERIFIED" } else { "FAILED" },
            trail.events.len(),
            short_hash(&trail.terminal_hash)
        );
        println!();

        Ok(ScenarioOutcome {
            request_id: *request_id,
            status: request.status,
            history_len: history.len(),
            chain_verified,
            escalations: self.notifier.escalations()?.len(),
        })
    }
}

pub fn print_state(label: &str, state: &RequestState) {
    println!(
        "  {label:<32} status={:?} group={} open_nodes={}",
        state.status,
        state
            .current_node_index
            .map_or_else(|| "-".to_string(), |i| i.to_string()),
        state.active_nodes.len()
    );
}

/// Print a refused call. The scenarios use this for the calls they expect
/// the engine to turn down.
pub fn print_refusal(label: &str, error: &ApprovalError) {
    println!("  {label:<32} REFUSED ({:?}): {error}", error.class());
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
