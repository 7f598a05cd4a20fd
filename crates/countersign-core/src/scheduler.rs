//! Deadline tracking and escalation firing.
//!
//! The scheduler keeps a time-ordered set of node deadlines. `fire_due`
//! pops every elapsed entry and runs its callback once. Callbacks are
//! `FnOnce`: an entry is removed before its callback runs, so a fired or
//! cancelled entry can never fire again.
//!
//! The scheduler never touches node status. Escalation is a notification
//! side-channel only; whether the node is still open is for the callback to
//! check.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use countersign_contracts::{
    error::{poisoned, ApprovalResult},
    ids::NodeId,
};

use crate::clock::Clock;

/// Invoked with the node and the instant the deadline was processed.
pub type EscalationCallback = Box<dyn FnOnce(&NodeId, DateTime<Utc>) -> ApprovalResult<()> + Send>;

struct Entry {
    deadline: DateTime<Utc>,
    seq: u64,
    callback: EscalationCallback,
}

#[derive(Default)]
struct SchedulerState {
    /// `(deadline, registration order, node)`; the order breaks deadline ties.
    queue: BTreeSet<(DateTime<Utc>, u64, NodeId)>,
    entries: HashMap<NodeId, Entry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct EscalationScheduler {
    state: Mutex<SchedulerState>,
}

impl EscalationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to run once `deadline` has passed.
    ///
    /// Registering a node that already has an entry replaces it.
    pub fn register(
        &self,
        node_id: NodeId,
        deadline: DateTime<Utc>,
        callback: EscalationCallback,
    ) -> ApprovalResult<()> {
        let mut state = self.state.lock().map_err(poisoned("escalation scheduler"))?;

        if let Some(previous) = state.entries.remove(&node_id) {
            state.queue.remove(&(previous.deadline, previous.seq, node_id));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.insert((deadline, seq, node_id));
        state.entries.insert(node_id, Entry { deadline, seq, callback });

        debug!(node_id = %node_id, deadline = %deadline, "escalation registered");
        Ok(())
    }

    /// Drop the entry for `node_id`. Returns whether one existed.
    pub fn cancel(&self, node_id: &NodeId) -> ApprovalResult<bool> {
        let mut state = self.state.lock().map_err(poisoned("escalation scheduler"))?;
        match state.entries.remove(node_id) {
            Some(entry) => {
                state.queue.remove(&(entry.deadline, entry.seq, *node_id));
                debug!(node_id = %node_id, "escalation cancelled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fire every entry whose deadline is at or before `now`.
    ///
    /// Callbacks run after the scheduler lock is released, in deadline
    /// order. A failing callback is logged; the rest still run. Returns the
    /// number of callbacks invoked.
    pub fn fire_due(&self, now: DateTime<Utc>) -> ApprovalResult<usize> {
        let due: Vec<(NodeId, EscalationCallback)> = {
            let mut state = self.state.lock().map_err(poisoned("escalation scheduler"))?;
            let mut due = Vec::new();
            while let Some(&(deadline, _, node_id)) = state.queue.first() {
                if deadline > now {
                    break;
                }
                state.queue.pop_first();
                if let Some(entry) = state.entries.remove(&node_id) {
                    due.push((node_id, entry.callback));
                }
            }
            due
        };

        let fired = due.len();
        for (node_id, callback) in due {
            info!(node_id = %node_id, "escalation deadline elapsed");
            if let Err(e) = callback(&node_id, now) {
                warn!(node_id = %node_id, error = %e, "escalation callback failed");
            }
        }
        Ok(fired)
    }

    /// Number of entries still waiting to fire.
    pub fn pending(&self) -> ApprovalResult<usize> {
        let state = self.state.lock().map_err(poisoned("escalation scheduler"))?;
        Ok(state.entries.len())
    }

    /// Earliest registered deadline, if any.
    pub fn next_deadline(&self) -> ApprovalResult<Option<DateTime<Utc>>> {
        let state = self.state.lock().map_err(poisoned("escalation scheduler"))?;
        Ok(state.queue.first().map(|(deadline, _, _)| *deadline))
    }
}

// ── Background ticker ─────────────────────────────────────────────────────────

/// Drives `fire_due` from a background thread at a fixed interval.
///
/// The thread stops when `stop()` is called or the ticker is dropped.
pub struct EscalationTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EscalationTicker {
    pub fn spawn(
        scheduler: Arc<EscalationScheduler>,
        clock: Arc<dyn Clock>,
        interval: std::time::Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                if let Err(e) = scheduler.fire_due(clock.now()) {
                    warn!(error = %e, "escalation tick failed");
                }
                thread::park_timeout(interval);
            }
            debug!("escalation ticker stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("escalation ticker thread panicked");
            }
        }
    }
}

impl Drop for EscalationTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
