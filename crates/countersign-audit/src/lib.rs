//! # countersign-audit
//!
//! Append-only, SHA-256 hash-chained approval history.
//!
//! ## Overview
//!
//! Every accepted action the engine records is wrapped in a `HistoryEvent`
//! linked to the request's previous event by its SHA-256 hash. Altering any
//! stored entry breaks the chain and `verify_chain` reports it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use countersign_audit::InMemoryHistoryLog;
//!
//! let log = Arc::new(InMemoryHistoryLog::new());
//! let engine = WorkflowEngine::new(catalog, directory, log.clone());
//! // ... drive the engine ...
//! assert!(log.verify_integrity(&request_id)?);
//! let trail = log.export_trail(&request_id)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditTrail, HistoryEvent};
pub use memory::InMemoryHistoryLog;

// ── Tests ─────────────────────────────────────────────────────────────────────
