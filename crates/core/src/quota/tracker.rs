//! In-memory counter of active jobs per requester.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::channel::RequesterId;

/// Bounds how many jobs a single requester may run at once.
///
/// Shared between concurrently running jobs behind an `Arc`; every mutation
/// happens under one lock so acquire/release never lose updates.
#[derive(Debug)]
pub struct QuotaTracker {
    ceiling: u32,
    active: Mutex<HashMap<RequesterId, u32>>,
}

impl QuotaTracker {
    /// Create a tracker allowing `ceiling` concurrent jobs per requester.
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// The configured per-requester ceiling.
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Take a slot for `requester`.
    ///
    /// Returns `false` and leaves the count untouched when the requester is
    /// already at the ceiling.
    pub fn try_acquire(&self, requester: &RequesterId) -> bool {
        let mut active = self.lock();
        let count = active.entry(requester.clone()).or_insert(0);
        if *count >= self.ceiling {
            debug!("Quota exhausted for {} ({}/{})", requester, count, self.ceiling);
            return false;
        }
        *count += 1;
        debug!("Quota acquired for {} ({}/{})", requester, count, self.ceiling);
        true
    }

    /// Give back a slot. Never drops below zero, so a release racing a
    /// `reset` is harmless.
    pub fn release(&self, requester: &RequesterId) {
        let mut active = self.lock();
        let Some(count) = active.get_mut(requester) else {
            return;
        };
        *count = count.saturating_sub(1);
        debug!("Quota released for {} ({}/{})", requester, count, self.ceiling);
        if *count == 0 {
            active.remove(requester);
        }
    }

    /// Force the requester's count to zero.
    pub fn reset(&self, requester: &RequesterId) {
        self.lock().remove(requester);
        debug!("Quota reset for {}", requester);
    }

    /// Number of requesters with at least one active job.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Current number of active jobs for `requester`.
    pub fn active(&self, requester: &RequesterId) -> u32 {
        self.lock().get(requester).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequesterId, u32>> {
        // Counters stay consistent even if a holder panicked mid-update.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn alice() -> RequesterId {
        RequesterId::new("alice")
    }

    #[test]
    fn test_acquire_up_to_ceiling() {
        let quota = QuotaTracker::new(3);
        assert!(quota.try_acquire(&alice()));
        assert!(quota.try_acquire(&alice()));
        assert!(quota.try_acquire(&alice()));
        assert!(!quota.try_acquire(&alice()));
        assert_eq!(quota.active(&alice()), 3);
    }

    #[test]
    fn test_release_frees_a_slot() {
        let quota = QuotaTracker::new(3);
        for _ in 0..3 {
            assert!(quota.try_acquire(&alice()));
        }
        assert!(!quota.try_acquire(&alice()));
        assert_eq!(quota.active(&alice()), 3);

        quota.release(&alice());
        assert!(quota.try_acquire(&alice()));
        assert_eq!(quota.active(&alice()), 3);
    }

    #[test]
    fn test_requesters_are_independent() {
        let quota = QuotaTracker::new(1);
        let bob = RequesterId::new("bob");
        assert!(quota.try_acquire(&alice()));
        assert!(quota.try_acquire(&bob));
        assert!(!quota.try_acquire(&alice()));
    }

    #[test]
    fn test_reset_then_release_stays_at_zero() {
        let quota = QuotaTracker::new(3);
        quota.try_acquire(&alice());
        quota.try_acquire(&alice());
        quota.reset(&alice());
        quota.release(&alice());
        quota.release(&alice());
        assert_eq!(quota.active(&alice()), 0);
        assert!(quota.try_acquire(&alice()));
        assert_eq!(quota.active(&alice()), 1);
    }

    #[test]
    fn test_release_unknown_requester_is_noop() {
        let quota = QuotaTracker::new(3);
        quota.release(&alice());
        assert_eq!(quota.active(&alice()), 0);
    }

    #[test]
    fn test_reset_unknown_requester() {
        let quota = QuotaTracker::new(3);
        quota.reset(&alice());
        assert_eq!(quota.active(&alice()), 0);
    }

    #[test]
    fn test_idle_requesters_are_forgotten() {
        let quota = QuotaTracker::new(3);
        let bob = RequesterId::new("bob");
        assert!(quota.try_acquire(&alice()));
        assert!(quota.try_acquire(&alice()));
        assert!(quota.try_acquire(&bob));
        assert_eq!(quota.tracked(), 2);

        quota.release(&alice());
        assert_eq!(quota.tracked(), 2);
        quota.release(&alice());
        assert_eq!(quota.tracked(), 1);

        quota.reset(&bob);
        assert_eq!(quota.tracked(), 0);
        assert_eq!(quota.active(&bob), 0);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_ceiling() {
        let quota = Arc::new(QuotaTracker::new(3));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let quota = Arc::clone(&quota);
                std::thread::spawn(move || quota.try_acquire(&RequesterId::new("alice")))
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();

        assert_eq!(granted, 3);
        assert_eq!(quota.active(&alice()), 3);
    }
}
