//! # countersign-templates
//!
//! A TOML-driven, versioned template catalog and a static approver
//! directory for COUNTERSIGN.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use countersign_templates::{CatalogConfig, StaticApproverResolver, TemplateCatalog};
//!
//! let config = CatalogConfig::from_file(Path::new("templates/retail.toml"))?;
//! let catalog = TemplateCatalog::from_config(&config)?;
//! let directory = StaticApproverResolver::from_config(&config);
//! // Pass both to `countersign_core::WorkflowEngine::new(...)`.
//! ```
//!
//! ## Versioning
//!
//! `publish` appends a new version; `active` returns the highest enabled
//! one. Requests already submitted keep the version they were bound to.

pub mod catalog;
pub mod config;
pub mod directory;

pub use catalog::TemplateCatalog;
pub use config::{ApproverGroup, CatalogConfig};
pub use directory::StaticApproverResolver;

// ── Tests ─────────────────────────────────────────────────────────────────────
