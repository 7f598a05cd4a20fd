//! Catalog configuration schema.
//!
//! One TOML document carries both the templates and the approver directory:
//!
//! ```toml
//! [[templates]]
//! id = "expense"
//! name = "Expense claim"
//! request_type = "expense"
//!
//! [[templates.nodes]]
//! name = "Line manager"
//! sequence = 0
//! approver_resolver = "store-managers"
//! policy = "any"
//! deadline_hours = 24
//! escalate_to = "regional-director"
//!
//! [[approvers]]
//! reference = "store-managers"
//! members = [{ id = "m.dupont", name = "Marie Dupont" }]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use countersign_contracts::{
    error::{ApprovalError, ApprovalResult},
    node::ApproverRef,
    template::ApprovalTemplate,
};

/// One named group of the approver directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproverGroup {
    /// The string a blueprint's `approver_resolver` names.
    pub reference: String,
    #[serde(default)]
    pub members: Vec<ApproverRef>,
}

/// The top-level structure deserialized from a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Templates in publication order. A template without `version` gets the
    /// next free one.
    #[serde(default)]
    pub templates: Vec<ApprovalTemplate>,
    #[serde(default)]
    pub approvers: Vec<ApproverGroup>,
}

impl CatalogConfig {
    /// Returns `ConfigError` if the TOML is malformed or does not match the
    /// schema.
    pub fn from_toml_str(s: &str) -> ApprovalResult<Self> {
        toml::from_str(s).map_err(|e| ApprovalError::ConfigError {
            reason: format!("failed to parse catalog TOML: {e}"),
        })
    }

    pub fn from_file(path: &Path) -> ApprovalResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ApprovalError::ConfigError {
            reason: format!("failed to read catalog file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }
}
