//! Schema and rule based form validator.
//!
//! Every failure is collected before returning, so the applicant sees the
//! full list in one `FormInvalid` error rather than fixing one field at a
//! time. Domain checks that do not fit the built-in rules are registered by
//! name through `register_rule`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use countersign_contracts::{
    error::ApprovalResult,
    template::{field_at, FormCheck, FormFailure, FormReport, FormSpec},
};
use countersign_core::traits::FormValidator;

/// A caller-supplied form check.
///
/// Receives the whole form payload. Returns `Some(message)` on failure.
pub type CustomRuleFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

const SCHEMA_RULE_ID: &str = "json-schema";

pub struct SchemaFormValidator {
    custom_rules: HashMap<String, CustomRuleFn>,
}

impl SchemaFormValidator {
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// Register `f` under `name`, the `function_name` of `Custom` rules.
    /// Registering a name twice replaces the earlier function.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomRuleFn) {
        self.custom_rules.insert(name.into(), f);
    }

    fn check_schema(schema: &Value, form_data: &Value, failures: &mut Vec<FormFailure>) {
        if schema.is_null() {
            return;
        }
        match jsonschema::validator_for(schema) {
            Ok(validator) => {
                for error in validator.iter_errors(form_data) {
                    let message = format!("schema violation at {}: {}", error.instance_path, error);
                    debug!(%message, "form schema failure");
                    failures.push(FormFailure {
                        rule_id: SCHEMA_RULE_ID.to_string(),
                        message,
                    });
                }
            }
            Err(e) => {
                let message = format!("invalid JSON Schema document: {e}");
                warn!(%message, "form schema does not compile");
                failures.push(FormFailure {
                    rule_id: SCHEMA_RULE_ID.to_string(),
                    message,
                });
            }
        }
    }

    fn check_rule(&self, check: &FormCheck, form_data: &Value) -> Option<String> {
        match check {
            FormCheck::RequiredField { field_path } => field_at(form_data, field_path)
                .is_none()
                .then(|| format!("required field '{field_path}' is missing or null")),

            FormCheck::AllowedValues { field_path, allowed } => match field_at(form_data, field_path) {
                None => Some(format!("field '{field_path}' is missing; cannot check allowed values")),
                Some(actual) if allowed.contains(actual) => None,
                Some(actual) => Some(format!("field '{field_path}' has value {actual} which is not allowed")),
            },

            FormCheck::MaxNumber { field_path, max } => match field_at(form_data, field_path) {
                None => None,
                Some(value) => match value.as_f64() {
                    None => Some(format!("field '{field_path}' is not a number")),
                    Some(n) if n > *max => Some(format!("field '{field_path}' is {n}, above the limit of {max}")),
                    Some(_) => None,
                },
            },

            // An unregistered name fails, so a misconfigured template shows up
            // on the first submission.
            FormCheck::Custom { function_name } => match self.custom_rules.get(function_name.as_str()) {
                Some(f) => f(form_data),
                None => Some(format!("no custom rule registered for function name '{function_name}'")),
            },
        }
    }
}

impl Default for SchemaFormValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormValidator for SchemaFormValidator {
    fn validate(&self, spec: &FormSpec, form_data: &Value) -> ApprovalResult<FormReport> {
        let mut failures = Vec::new();

        Self::check_schema(&spec.schema, form_data, &mut failures);

        for rule in &spec.rules {
            if let Some(message) = self.check_rule(&rule.check, form_data) {
                debug!(rule_id = %rule.rule_id, %message, "form rule failed");
                failures.push(FormFailure {
                    rule_id: rule.rule_id.clone(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(passed, failure_count = failures.len(), "form validated");
        Ok(FormReport { passed, failures })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
