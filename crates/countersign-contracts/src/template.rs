//! Approval template and form spec types.
//!
//! A template is the blueprint a request is materialized from. Templates are
//! versioned: the catalog stamps `version` on publication, and a request
//! records the version it was bound to at submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{node::ApprovalPolicy, request::RequestType};

/// One stage of a template, before approvers are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBlueprint {
    pub name: String,
    /// Contiguous from 0; equal numbers mean a parallel group.
    pub sequence: u32,
    /// Reference handed to the `ApproverResolver` (a directory group,
    /// `applicant`, or `form:<field>`).
    pub approver_resolver: String,
    pub policy: ApprovalPolicy,
    /// Deadline offset from submission, in hours. `None` means no deadline.
    #[serde(default)]
    pub deadline_hours: Option<i64>,
    #[serde(default)]
    pub escalate_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTemplate {
    pub id: String,
    pub name: String,
    pub request_type: RequestType,
    /// Assigned by the catalog on publication.
    #[serde(default)]
    pub version: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional constraints on the request's form data.
    #[serde(default)]
    pub form: Option<FormSpec>,
    pub nodes: Vec<NodeBlueprint>,
}

fn default_enabled() -> bool {
    true
}

/// Constraints a request's `form_data` must meet before it can be submitted.
///
/// Combines a JSON Schema document with rules JSON Schema cannot express
/// conveniently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormSpec {
    /// JSON Schema document. `Null` disables structural validation.
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub rules: Vec<FormRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRule {
    pub rule_id: String,
    #[serde(default)]
    pub description: String,
    pub check: FormCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormCheck {
    /// The field at `field_path` (dotted) must be present and non-null.
    RequiredField { field_path: String },

    /// The field must equal one of `allowed`.
    AllowedValues {
        field_path: String,
        allowed: Vec<Value>,
    },

    /// A numeric field must not exceed `max`. Absent fields pass.
    MaxNumber { field_path: String, max: f64 },

    /// Delegate to a function registered with the validator by name.
    Custom { function_name: String },
}

/// Result of validating form data against a `FormSpec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormReport {
    pub passed: bool,
    pub failures: Vec<FormFailure>,
}

impl FormReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
        }
    }

    /// `"[rule] message; [rule] message"`, used in `FormInvalid` errors.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFailure {
    pub rule_id: String,
    pub message: String,
}

/// Resolve a dotted path (`"budget.total"`) against form data. `None` when a
/// segment is missing or the value is JSON `null`.
pub fn field_at<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) if !v.is_null() => current = v,
            _ => return None,
        }
    }
    Some(current)
}
