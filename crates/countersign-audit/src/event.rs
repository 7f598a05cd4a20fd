//! Chained history types.
//!
//! `HistoryEvent` wraps one `HistoryEntry` with the SHA-256 hashes that bind
//! it to its predecessor. `AuditTrail` is the exported chain of one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use countersign_contracts::{history::HistoryEntry, ids::RequestId};

/// One link in a request's hash chain.
///
/// Changing any field, including those of the embedded `entry`, invalidates
/// `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Position in the chain, starting at 0. Equal to `entry.sequence`.
    pub sequence: u64,
    pub request_id: RequestId,
    pub entry: HistoryEntry,
    /// Hex SHA-256 of the previous event, or `GENESIS_HASH`.
    pub prev_hash: String,
    /// Hex SHA-256 over (request_id, sequence, prev_hash, entry JSON).
    pub this_hash: String,
}

impl HistoryEvent {
    /// `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// The full chain of one request, as exported for an auditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub request_id: RequestId,
    pub events: Vec<HistoryEvent>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last event; empty when the chain is empty. A
    /// compact commitment to the whole trail.
    pub terminal_hash: String,
}
