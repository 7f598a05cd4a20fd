//! # countersign-contracts
//!
//! Shared types, state enums, and errors for the COUNTERSIGN approval engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond small accessors on the data types.

pub mod error;
pub mod event;
pub mod history;
pub mod ids;
pub mod node;
pub mod request;
pub mod template;
