//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. request_id as its hyphenated UUID string
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the history entry

use sha2::{Digest, Sha256};

use countersign_contracts::{
    error::{ApprovalError, ApprovalResult},
    history::HistoryEntry,
    ids::RequestId,
};

use crate::event::HistoryEvent;

/// SHA-256 of one chain link, as a lowercase 64-character hex string.
pub fn hash_event(
    request_id: &RequestId,
    sequence: u64,
    entry: &HistoryEntry,
    prev_hash: &str,
) -> ApprovalResult<String> {
    let entry_json = serde_json::to_vec(entry).map_err(|e| ApprovalError::AuditWriteFailed {
        reason: format!("history entry is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(request_id.to_string().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&entry_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check a chain link by link.
///
/// Valid when every `prev_hash` equals the previous `this_hash` (or
/// `GENESIS_HASH` first), every `this_hash` recomputes, and sequence numbers
/// run 0, 1, 2, ... in step with the embedded entries. An empty chain is
/// valid.
pub fn verify_chain(events: &[HistoryEvent]) -> bool {
    let mut expected_prev = HistoryEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.entry.sequence != event.sequence {
            return false;
        }
        if event.entry.request_id != event.request_id || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.request_id, event.sequence, &event.entry, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
