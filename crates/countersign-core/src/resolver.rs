//! Template resolution: blueprint → concrete, frozen node sequence.
//!
//! Resolution runs once per request, at submission. Approver identities and
//! deadlines are fixed at that instant; later template publications or
//! directory changes do not reach in-flight requests.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::debug;

use countersign_contracts::{
    error::{ApprovalError, ApprovalResult},
    ids::{ActorId, NodeId},
    node::{ApprovalNode, NodeStatus},
    template::{ApprovalTemplate, NodeBlueprint},
};

use crate::traits::ApproverResolver;

pub struct TemplateResolver;

impl TemplateResolver {
    /// Materialize `template` into nodes for one request.
    ///
    /// Nodes come back ordered by `sequence` (stable for blueprints sharing a
    /// sequence). Sequence-0 nodes are `Pending`, all others `Waiting`.
    ///
    /// # Errors
    ///
    /// `TemplateInvalid` when the template is disabled or empty, sequence
    /// numbers are not contiguous from 0, a deadline offset is not positive
    /// or does not fit a timestamp, or a node resolves to zero approvers. Resolver errors pass through.
    pub fn resolve(
        template: &ApprovalTemplate,
        form_data: &Value,
        applicant: &ActorId,
        approvers: &dyn ApproverResolver,
        now: DateTime<Utc>,
    ) -> ApprovalResult<Vec<ApprovalNode>> {
        let invalid = |reason: String| ApprovalError::TemplateInvalid {
            template_id: template.id.clone(),
            reason,
        };

        if !template.enabled {
            return Err(invalid(format!("version {} is disabled", template.version)));
        }
        if template.nodes.is_empty() {
            return Err(invalid("template has no nodes".to_string()));
        }

        let mut blueprints: Vec<&NodeBlueprint> = template.nodes.iter().collect();
        blueprints.sort_by_key(|b| b.sequence);
        Self::check_contiguous(&blueprints).map_err(invalid)?;

        let mut nodes = Vec::with_capacity(blueprints.len());
        for blueprint in blueprints {
            let resolved = approvers.resolve(&blueprint.approver_resolver, applicant, form_data)?;

            // An approver appears on a node at most once; first occurrence wins.
            let mut seen = HashSet::new();
            let node_approvers: Vec<_> = resolved
                .into_iter()
                .filter(|a| seen.insert(a.id.clone()))
                .map(|a| a.into_approver())
                .collect();

            if node_approvers.is_empty() {
                return Err(invalid(format!(
                    "node '{}' resolved to no approvers via '{}'",
                    blueprint.name, blueprint.approver_resolver
                )));
            }

            let deadline = match blueprint.deadline_hours {
                None => None,
                Some(hours) if hours > 0 => {
                    let deadline = Duration::try_hours(hours).and_then(|offset| now.checked_add_signed(offset));
                    match deadline {
                        Some(at) => Some(at),
                        None => {
                            return Err(invalid(format!(
                                "node '{}' deadline offset {}h out of range",
                                blueprint.name, hours
                            )))
                        }
                    }
                }
                Some(hours) => {
                    return Err(invalid(format!(
                        "node '{}' has non-positive deadline offset {}h",
                        blueprint.name, hours
                    )))
                }
            };

            nodes.push(ApprovalNode {
                id: NodeId::new(),
                name: blueprint.name.clone(),
                sequence: blueprint.sequence,
                approvers: node_approvers,
                policy: blueprint.policy,
                status: if blueprint.sequence == 0 {
                    NodeStatus::Pending
                } else {
                    NodeStatus::Waiting
                },
                deadline,
                escalate_to: blueprint.escalate_to.clone(),
            });
        }

        debug!(
            template_id = %template.id,
            version = template.version,
            node_count = nodes.len(),
            "template resolved"
        );

        Ok(nodes)
    }

    /// Sorted sequences must start at 0 and never skip a number.
    fn check_contiguous(sorted: &[&NodeBlueprint]) -> Result<(), String> {
        let mut expected_max = 0u32;
        for (i, blueprint) in sorted.iter().enumerate() {
            let seq = blueprint.sequence;
            let ok = if i == 0 {
                seq == 0
            } else {
                seq == expected_max || seq == expected_max + 1
            };
            if !ok {
                return Err(format!(
                    "sequence numbers are not contiguous: node '{}' has sequence {} after {}",
                    blueprint.name, seq, expected_max
                ));
            }
            expected_max = seq;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
