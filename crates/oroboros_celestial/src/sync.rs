//! # Sync Ledger
//!
//! Slave-side bookkeeping of what has been asked for and what is held.
//!
//! ```text
//!             pull_requests            push_responses
//!   Unknown ───────────────► Pending ─────────────────► Known
//!      ▲                        │                         │
//!      └──── timeout lapses ────┘                         │
//!      └────────────── TTL expiry / invalidation ─────────┘
//! ```
//!
//! Keys in `Unknown` are not stored; the table only grows with outstanding
//! and cached keys.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::protocol::CelestialRequest;

/// Sync state of one request key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Never asked for, or forgotten.
    Unknown,
    /// Asked for at `since`, no answer yet.
    Pending {
        /// When the request went out.
        since: Instant,
    },
    /// Answered and cached.
    Known,
}

/// Explicit per-key state table.
pub struct SyncLedger {
    states: BTreeMap<CelestialRequest, SyncState>,
    timeout: Duration,
}

impl SyncLedger {
    /// Creates an empty ledger with the given request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { states: BTreeMap::new(), timeout }
    }

    /// Current state of a key.
    #[must_use]
    pub fn state(&self, key: &CelestialRequest) -> SyncState {
        self.states.get(key).copied().unwrap_or(SyncState::Unknown)
    }

    /// Returns true if `key` may be requested at `now`.
    #[must_use]
    pub fn is_requestable(&self, key: &CelestialRequest, now: Instant) -> bool {
        match self.state(key) {
            SyncState::Unknown => true,
            SyncState::Pending { since } => now.duration_since(since) >= self.timeout,
            SyncState::Known => false,
        }
    }

    /// `Unknown → Pending`. Returns false (and changes nothing) unless the
    /// key is requestable.
    pub fn mark_pending(&mut self, key: CelestialRequest, now: Instant) -> bool {
        if !self.is_requestable(&key, now) {
            return false;
        }
        self.states.insert(key, SyncState::Pending { since: now });
        true
    }

    /// `* → Known`. Returns true if the key was pending.
    pub fn mark_known(&mut self, key: CelestialRequest) -> bool {
        let previous = self.states.insert(key, SyncState::Known);
        matches!(previous, Some(SyncState::Pending { .. }))
    }

    /// `* → Unknown`.
    pub fn forget(&mut self, key: &CelestialRequest) {
        self.states.remove(key);
    }

    /// Drops pending entries older than the timeout. Returns how many.
    pub fn expire_pending(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.states.len();
        self.states.retain(|_, state| match state {
            SyncState::Pending { since } => now.duration_since(*since) < timeout,
            _ => true,
        });
        before - self.states.len()
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.states.values().filter(|s| matches!(s, SyncState::Pending { .. })).count()
    }

    /// Number of known keys.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.states.values().filter(|s| matches!(s, SyncState::Known)).count()
    }
}
