//! # countersign-core
//!
//! The approval runtime for COUNTERSIGN.
//!
//! This crate provides:
//! - The collaborator traits (`TemplateSource`, `ApproverResolver`,
//!   `FormValidator`, `HistoryLog`, `Notifier`) and the `Clock`
//! - `NodeEvaluator` and `TemplateResolver`, the pure decision logic
//! - `EscalationScheduler` for node deadlines
//! - The `WorkflowEngine` that wires them together per request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use countersign_core::{WorkflowEngine, traits::{TemplateSource, ApproverResolver, HistoryLog}};
//! ```

pub mod clock;
pub mod engine;
pub mod evaluator;
pub mod resolver;
pub mod scheduler;
pub mod traits;

pub use engine::{InboxItem, WorkflowEngine};
