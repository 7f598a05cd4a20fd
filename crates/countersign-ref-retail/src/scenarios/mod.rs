//! Retail reference scenarios.
//!
//! Each scenario builds its own `RetailRuntime`, so they share nothing and
//! can run in any order. Every one prints its steps and ends with the
//! request's history and hash-chain status.

pub mod candidate_location;
pub mod expense_claim;
pub mod fit_out_purchase;
pub mod lease_contract;
pub mod store_plan;
