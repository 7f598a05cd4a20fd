//! # countersign-ref-retail
//!
//! Retail store-lifecycle reference runtime for the COUNTERSIGN approval engine.
//!
//! Runs five approval workflows over a TOML catalog and mock data:
//!
//! 1. **Store Plan**: two sequential single-approver nodes, approved end to end.
//! 2. **Expense Claim**: a form that fails validation, then an all-policy node
//!    vetoed by one controller.
//! 3. **Lease Contract**: the applicant withdraws while legal review is open.
//! 4. **Candidate Location**: the scout named on the form misses a deadline
//!    and the node escalates once; a committee then approves by majority.
//! 5. **Fit-out Purchase**: parallel finance and procurement nodes with a
//!    transfer and an add-sign.
//!
//! All data is hardcoded and fictional. Deadlines run on a manual clock.

pub mod mock_data;
pub mod runtime;
pub mod scenarios;
