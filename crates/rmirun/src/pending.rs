//! # Pending-call registry
//!
//! Correlates outbound calls with their eventual responses. Ids are handed out
//! by a plain counter owned by the dispatcher worker: they start at 1, only go
//! up, and are never reused while the process runs.
//!
//! An id is present iff its call was sent and has not been resolved, expired or
//! reported unreachable. Each of those removes it exactly once.

use std::collections::HashMap;
use std::time::Duration;

use rmiwire::Callback;
use tokio::time::Instant;

/// An outbound call waiting for its response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingCall {
    pub callback: Callback,
    pub method: String,
    pub sent_at: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    calls: HashMap<u64, PendingCall>,
    last_id: u64,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call under a fresh id and returns the id.
    pub fn insert(&mut self, call: PendingCall) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        self.calls.insert(id, call);
        id
    }

    /// Removes and returns the call registered under `id`.
    pub fn take(&mut self, id: u64) -> Option<PendingCall> {
        self.calls.remove(&id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: u64) -> bool {
        self.calls.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Drops every call older than `expiry` as of `now`. Returns how many went.
    pub fn sweep(&mut self, now: Instant, expiry: Duration) -> usize {
        let before = self.calls.len();
        self.calls
            .retain(|_, call| now.saturating_duration_since(call.sent_at) <= expiry);
        before - self.calls.len()
    }
}

#[cfg(test)]
mod tests {
    use rmiwire::Address;

    use super::*;

    fn pending(sent_at: Instant) -> PendingCall {
        PendingCall {
            callback: Callback::new(Address::new("rmi", "client"), "done"),
            method: "ping".into(),
            sent_at,
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut calls = PendingCalls::new();
        let now = Instant::now();
        let ids: Vec<u64> = (0..5).map(|_| calls.insert(pending(now))).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut calls = PendingCalls::new();
        let now = Instant::now();
        let first = calls.insert(pending(now));
        assert!(calls.take(first).is_some());
        assert!(calls.take(first).is_none());

        let second = calls.insert(pending(now));
        assert!(second > first);
        assert!(!calls.contains(first));
    }

    #[test]
    fn test_sweep_removes_only_calls_past_expiry() {
        let mut calls = PendingCalls::new();
        let t0 = Instant::now();
        let old = calls.insert(pending(t0));
        let edge = calls.insert(pending(t0 + Duration::from_secs(10)));
        let fresh = calls.insert(pending(t0 + Duration::from_secs(50)));

        let expiry = Duration::from_secs(60);
        let removed = calls.sweep(t0 + Duration::from_secs(70), expiry);

        assert_eq!(removed, 1);
        assert!(!calls.contains(old));
        // Exactly at the expiry window is still alive.
        assert!(calls.contains(edge));
        assert!(calls.contains(fresh));
        assert_eq!(calls.len(), 2);
    }
}
