//! Versioned template catalog.
//!
//! Every publication of a template id adds a new version; nothing is edited
//! in place. `active` hands the engine the highest enabled version, and a
//! request keeps the version it was submitted against.

use std::{collections::HashMap, path::Path, sync::RwLock};

use tracing::{debug, info};

use countersign_contracts::{
    error::{poisoned, ApprovalError, ApprovalResult},
    template::ApprovalTemplate,
};
use countersign_core::traits::TemplateSource;

use crate::config::CatalogConfig;

/// An in-memory, versioned `TemplateSource`.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    /// Versions per template id, ascending.
    templates: RwLock<HashMap<String, Vec<ApprovalTemplate>>>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the templates of a parsed config.
    ///
    /// Templates carrying an explicit `version` keep it; the rest are
    /// published in file order.
    pub fn from_config(config: &CatalogConfig) -> ApprovalResult<Self> {
        let catalog = Self::new();
        for template in &config.templates {
            if template.version == 0 {
                catalog.publish(template.clone())?;
            } else {
                catalog.insert(template.clone())?;
            }
        }
        Ok(catalog)
    }

    pub fn from_toml_str(s: &str) -> ApprovalResult<Self> {
        Self::from_config(&CatalogConfig::from_toml_str(s)?)
    }

    pub fn from_file(path: &Path) -> ApprovalResult<Self> {
        Self::from_config(&CatalogConfig::from_file(path)?)
    }

    /// Store `template` as the next version of its id and return that
    /// version number. The first version is 1.
    pub fn publish(&self, mut template: ApprovalTemplate) -> ApprovalResult<u32> {
        Self::check_shape(&template)?;
        let mut templates = self.templates.write().map_err(poisoned("template catalog"))?;
        let versions = templates.entry(template.id.clone()).or_default();

        let version = versions.last().map_or(1, |t| t.version + 1);
        template.version = version;
        info!(template_id = %template.id, version, enabled = template.enabled, "template published");
        versions.push(template);
        Ok(version)
    }

    /// Store a template under the version it already carries.
    fn insert(&self, template: ApprovalTemplate) -> ApprovalResult<()> {
        Self::check_shape(&template)?;
        let mut templates = self.templates.write().map_err(poisoned("template catalog"))?;
        let versions = templates.entry(template.id.clone()).or_default();

        if versions.iter().any(|t| t.version == template.version) {
            return Err(ApprovalError::ConfigError {
                reason: format!("template '{}' version {} is declared twice", template.id, template.version),
            });
        }
        debug!(template_id = %template.id, version = template.version, "template loaded");
        versions.push(template);
        versions.sort_by_key(|t| t.version);
        Ok(())
    }

    /// Fetch one specific version.
    pub fn version(&self, template_id: &str, version: u32) -> ApprovalResult<ApprovalTemplate> {
        let templates = self.templates.read().map_err(poisoned("template catalog"))?;
        templates
            .get(template_id)
            .and_then(|versions| versions.iter().find(|t| t.version == version))
            .cloned()
            .ok_or_else(|| ApprovalError::NotFound {
                kind: "template version",
                id: format!("{template_id}@{version}"),
            })
    }

    /// Enable or disable one version. Disabling every version leaves the
    /// template unusable for new submissions.
    pub fn set_enabled(&self, template_id: &str, version: u32, enabled: bool) -> ApprovalResult<()> {
        let mut templates = self.templates.write().map_err(poisoned("template catalog"))?;
        let template = templates
            .get_mut(template_id)
            .and_then(|versions| versions.iter_mut().find(|t| t.version == version))
            .ok_or_else(|| ApprovalError::NotFound {
                kind: "template version",
                id: format!("{template_id}@{version}"),
            })?;
        template.enabled = enabled;
        info!(template_id = %template_id, version, enabled, "template availability changed");
        Ok(())
    }

    /// Every (id, version) pair, sorted.
    pub fn versions(&self) -> ApprovalResult<Vec<(String, u32)>> {
        let templates = self.templates.read().map_err(poisoned("template catalog"))?;
        let mut all: Vec<(String, u32)> = templates
            .iter()
            .flat_map(|(id, versions)| versions.iter().map(move |t| (id.clone(), t.version)))
            .collect();
        all.sort();
        Ok(all)
    }

    fn check_shape(template: &ApprovalTemplate) -> ApprovalResult<()> {
        let reason = if template.id.trim().is_empty() {
            Some("template id is empty".to_string())
        } else if template.nodes.is_empty() {
            Some("template has no nodes".to_string())
        } else {
            template
                .nodes
                .iter()
                .find(|n| n.approver_resolver.trim().is_empty())
                .map(|n| format!("node '{}' has no approver resolver", n.name))
        };

        match reason {
            Some(reason) => Err(ApprovalError::TemplateInvalid {
                template_id: template.id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl TemplateSource for TemplateCatalog {
    /// The highest enabled version. When every version is disabled the latest
    /// one is returned as-is, so submission fails with `TemplateInvalid`.
    fn active(&self, template_id: &str) -> ApprovalResult<ApprovalTemplate> {
        let templates = self.templates.read().map_err(poisoned("template catalog"))?;
        let versions = templates
            .get(template_id)
            .filter(|versions| !versions.is_empty())
            .ok_or_else(|| ApprovalError::template_not_found(template_id))?;

        let chosen = versions
            .iter()
            .rev()
            .find(|t| t.enabled)
            .or_else(|| versions.last())
            .ok_or_else(|| ApprovalError::template_not_found(template_id))?;

        debug!(template_id = %template_id, version = chosen.version, "active template selected");
        Ok(chosen.clone())
    }
}
