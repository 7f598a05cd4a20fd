//! In-memory implementation of `HistoryLog`.
//!
//! Each request gets its own hash chain. The engine appends to a request's
//! chain only while holding that request's lock, so entries arrive in
//! sequence order; anything else is refused as a write failure.

use std::{collections::HashMap, sync::Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use countersign_contracts::{
    error::{poisoned, ApprovalError, ApprovalResult},
    history::HistoryEntry,
    ids::RequestId,
};
use countersign_core::traits::HistoryLog;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditTrail, HistoryEvent},
};

pub(crate) struct Chain {
    pub(crate) events: Vec<HistoryEvent>,
    last_hash: String,
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            last_hash: HistoryEvent::GENESIS_HASH.to_string(),
        }
    }
}

/// Append-only history backed by one SHA-256 chain per request.
#[derive(Default)]
pub struct InMemoryHistoryLog {
    pub(crate) chains: Mutex<HashMap<RequestId, Chain>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the chain of `request_id`. A request with no history has an
    /// empty, valid chain.
    pub fn verify_integrity(&self, request_id: &RequestId) -> ApprovalResult<bool> {
        let chains = self.chains.lock().map_err(poisoned("history log"))?;
        let valid = chains
            .get(request_id)
            .map_or(true, |chain| verify_chain(&chain.events));
        if !valid {
            warn!(request_id = %request_id, "history chain failed verification");
        }
        Ok(valid)
    }

    /// Copy out the full chain of `request_id`.
    pub fn export_trail(&self, request_id: &RequestId) -> ApprovalResult<AuditTrail> {
        let chains = self.chains.lock().map_err(poisoned("history log"))?;
        let events = chains
            .get(request_id)
            .map(|chain| chain.events.clone())
            .unwrap_or_default();
        let terminal_hash = events.last().map(|e| e.this_hash.clone()).unwrap_or_default();

        Ok(AuditTrail {
            request_id: *request_id,
            events,
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Number of requests with at least one entry.
    pub fn request_count(&self) -> ApprovalResult<usize> {
        Ok(self.chains.lock().map_err(poisoned("history log"))?.len())
    }
}

impl HistoryLog for InMemoryHistoryLog {
    fn append(&self, entry: &HistoryEntry) -> ApprovalResult<()> {
        let mut chains = self.chains.lock().map_err(poisoned("history log"))?;
        let chain = chains.entry(entry.request_id).or_default();

        let expected = chain.events.len() as u64;
        if entry.sequence != expected {
            return Err(ApprovalError::AuditWriteFailed {
                reason: format!(
                    "request {} expects history sequence {expected}, got {}",
                    entry.request_id, entry.sequence
                ),
            });
        }

        let prev_hash = chain.last_hash.clone();
        let this_hash = hash_event(&entry.request_id, entry.sequence, entry, &prev_hash)?;

        chain.events.push(HistoryEvent {
            sequence: entry.sequence,
            request_id: entry.request_id,
            entry: entry.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        chain.last_hash = this_hash;

        debug!(
            request_id = %entry.request_id,
            sequence = entry.sequence,
            action = ?entry.action,
            "history entry appended"
        );
        Ok(())
    }

    fn list(&self, request_id: &RequestId) -> ApprovalResult<Vec<HistoryEntry>> {
        let chains = self.chains.lock().map_err(poisoned("history log"))?;
        Ok(chains
            .get(request_id)
            .map(|chain| chain.events.iter().map(|e| e.entry.clone()).collect())
            .unwrap_or_default())
    }
}
