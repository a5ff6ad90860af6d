//! Shared poll-cycle status record.
//!
//! One internally synchronized snapshot store, injected wherever cycle
//! state is read or written. The running flag transition is check-and-set,
//! which is what enforces the single-flight rule for cycles; everything
//! else is last-writer-wins.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of the poller's externally visible state, served verbatim as
/// the `/status` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollStatus {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_added: u64,
}

/// Handle to the shared status record.
#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<PollStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone out the current state.
    pub fn snapshot(&self) -> PollStatus {
        self.inner.read().unwrap().clone()
    }

    /// Claim the running flag. Returns `false` when a cycle already holds
    /// it; the caller must not proceed in that case.
    pub fn try_begin(&self) -> bool {
        let mut status = self.inner.write().unwrap();
        if status.running {
            return false;
        }
        status.running = true;
        true
    }

    /// Record a successful cycle and release the running flag.
    pub fn finish_ok(&self, added: u64) {
        let now = Utc::now();
        let mut status = self.inner.write().unwrap();
        status.running = false;
        status.last_run_at = Some(now);
        status.last_ok_at = Some(now);
        status.last_error = None;
        status.last_added = added;
    }

    /// Record a failed cycle and release the running flag. `last_ok_at`
    /// keeps its previous value.
    pub fn finish_err(&self, error: impl Into<String>, added: u64) {
        let now = Utc::now();
        let mut status = self.inner.write().unwrap();
        status.running = false;
        status.last_run_at = Some(now);
        status.last_error = Some(error.into());
        status.last_added = added;
    }

    /// Release the running flag for a cycle that never reached its finish
    /// path. Wired into a drop guard around the cycle body.
    pub fn record_aborted(&self) {
        let now = Utc::now();
        let mut status = self.inner.write().unwrap();
        status.running = false;
        status.last_run_at = Some(now);
        status.last_error = Some("poll cycle aborted before completion".to_string());
        status.last_added = 0;
    }
}
