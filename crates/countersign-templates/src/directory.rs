//! Static approver directory.
//!
//! Blueprint references resolve in three ways:
//!
//! - `applicant`: the request's own applicant
//! - `form:<path>`: an identity carried in the form data, either an id
//!   string, an `{ id, name }` object, or an array mixing both
//! - anything else: a named group from the directory
//!
//! An unknown group resolves to nobody. The template resolver reports that
//! as an invalid template at submission.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use countersign_contracts::{
    error::ApprovalResult,
    ids::ActorId,
    node::ApproverRef,
    template::field_at,
};
use countersign_core::traits::ApproverResolver;

use crate::config::CatalogConfig;

pub const APPLICANT_REFERENCE: &str = "applicant";
pub const FORM_REFERENCE_PREFIX: &str = "form:";

#[derive(Debug, Default, Clone)]
pub struct StaticApproverResolver {
    groups: HashMap<String, Vec<ApproverRef>>,
}

impl StaticApproverResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        config
            .approvers
            .iter()
            .fold(Self::new(), |dir, group| dir.with_group(group.reference.clone(), group.members.clone()))
    }

    /// Add or replace a group.
    pub fn with_group(mut self, reference: impl Into<String>, members: Vec<ApproverRef>) -> Self {
        self.groups.insert(reference.into(), members);
        self
    }

    fn from_form(form_data: &Value, path: &str) -> Vec<ApproverRef> {
        match field_at(form_data, path) {
            Some(Value::Array(items)) => items.iter().filter_map(Self::identity).collect(),
            Some(value) => Self::identity(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn identity(value: &Value) -> Option<ApproverRef> {
        match value {
            Value::String(id) if !id.is_empty() => Some(ApproverRef::new(id.clone(), id.clone())),
            Value::Object(map) => {
                let id = map.get("id")?.as_str()?;
                let name = map.get("name").and_then(Value::as_str).unwrap_or(id);
                Some(ApproverRef::new(id, name))
            }
            _ => None,
        }
    }
}

impl ApproverResolver for StaticApproverResolver {
    fn resolve(&self, reference: &str, applicant: &ActorId, form_data: &Value) -> ApprovalResult<Vec<ApproverRef>> {
        let resolved = if reference == APPLICANT_REFERENCE {
            vec![ApproverRef::new(applicant.as_str(), applicant.as_str())]
        } else if let Some(path) = reference.strip_prefix(FORM_REFERENCE_PREFIX) {
            Self::from_form(form_data, path)
        } else {
            self.groups.get(reference).cloned().unwrap_or_default()
        };

        debug!(reference = %reference, count = resolved.len(), "approvers resolved");
        Ok(resolved)
    }
}
