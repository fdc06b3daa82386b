//! In-flight tracker
//!
//! Records which entry ids are currently owned by the dispatch pipeline
//! (queued or executing). An id can be claimed by one owner at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::EntryId;

#[derive(Debug, Default)]
struct TrackerInner {
    /// Claimed ids and the generation of the claim that owns them
    claims: HashMap<EntryId, u64>,

    /// Next claim generation
    next_generation: u64,
}

/// Set of entry ids currently claimed by a worker
///
/// Cloning is cheap; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        // Every critical section leaves the map consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim `id` if nobody owns it
    ///
    /// Returns `None` when the id is already in flight. The returned
    /// [`Claim`] releases the id when it is released or dropped.
    pub fn try_claim(&self, id: &EntryId) -> Option<Claim> {
        let mut inner = self.lock();
        if inner.claims.contains_key(id) {
            debug!(entry_id = %id, "InFlightTracker::try_claim: already in flight");
            return None;
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.claims.insert(id.clone(), generation);

        Some(Claim {
            id: id.clone(),
            generation,
            tracker: self.clone(),
            released: false,
        })
    }

    /// Remove `id` unconditionally
    ///
    /// Idempotent: releasing an id that is not in flight does nothing.
    /// Returns whether the id was present.
    pub fn release(&self, id: &EntryId) -> bool {
        let removed = self.lock().claims.remove(id).is_some();
        debug!(entry_id = %id, removed, "InFlightTracker::release: called");
        removed
    }

    /// Remove `id` only if it is still owned by `generation`
    fn release_generation(&self, id: &EntryId, generation: u64) -> bool {
        let mut inner = self.lock();
        match inner.claims.get(id) {
            Some(&owner) if owner == generation => {
                inner.claims.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.lock().claims.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().claims.is_empty()
    }

    /// Sorted copy of the in-flight ids
    pub fn snapshot(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self.lock().claims.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Ownership of one in-flight id
///
/// Dropping a claim releases the id, so entries discarded anywhere between
/// the dispatcher and a worker never stay stuck in flight. A claim only
/// releases the id it still owns: if the id was force-released and claimed
/// again, dropping the stale claim leaves the newer one alone.
#[derive(Debug)]
pub struct Claim {
    id: EntryId,
    generation: u64,
    tracker: InFlightTracker,
    released: bool,
}

impl Claim {
    pub fn id(&self) -> &EntryId {
        &self.id
    }

    /// Release the id now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            let removed = self.tracker.release_generation(&self.id, self.generation);
            debug!(entry_id = %self.id, removed, "Claim::release: called");
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> EntryId {
        EntryId::from(s)
    }

    #[test]
    fn test_claim_is_exclusive() {
        let tracker = InFlightTracker::new();

        let claim = tracker.try_claim(&id("e1"));
        assert_eq!(claim.as_ref().map(Claim::id), Some(&id("e1")));
        assert!(tracker.try_claim(&id("e1")).is_none());
        assert!(tracker.contains(&id("e1")));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_release_makes_id_claimable_again() {
        let tracker = InFlightTracker::new();

        let claim = tracker.try_claim(&id("e1")).unwrap();
        claim.release();

        assert!(!tracker.contains(&id("e1")));
        assert!(tracker.try_claim(&id("e1")).is_some());
    }

    #[test]
    fn test_drop_releases() {
        let tracker = InFlightTracker::new();

        {
            let _claim = tracker.try_claim(&id("e1")).unwrap();
            assert!(tracker.contains(&id("e1")));
        }

        assert!(tracker.is_empty());
    }

    #[test]
    fn test_release_is_idempotent() {
        let tracker = InFlightTracker::new();
        let _claim = tracker.try_claim(&id("e1")).unwrap();

        assert!(tracker.release(&id("e1")));
        assert!(!tracker.release(&id("e1")));
        assert!(!tracker.release(&id("never-claimed")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_stale_claim_does_not_release_newer_owner() {
        let tracker = InFlightTracker::new();

        let stale = tracker.try_claim(&id("e1")).unwrap();
        tracker.release(&id("e1"));
        let fresh = tracker.try_claim(&id("e1")).unwrap();

        drop(stale);
        assert!(tracker.contains(&id("e1")));

        fresh.release();
        assert!(!tracker.contains(&id("e1")));
    }

    #[test]
    fn test_snapshot_sorted() {
        let tracker = InFlightTracker::new();
        let _b = tracker.try_claim(&id("b")).unwrap();
        let _a = tracker.try_claim(&id("a")).unwrap();

        assert_eq!(tracker.snapshot(), vec![id("a"), id("b")]);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let tracker = InFlightTracker::new();
        let winners = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    if let Some(claim) = tracker.try_claim(&id("hot")) {
                        winners.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        // Keep the claim so losers can't win after release
                        std::mem::forget(claim);
                    }
                });
            }
        });

        assert_eq!(winners.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Claim(u8),
        Release(u8),
        DropClaim(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Claim),
            (0u8..4).prop_map(Op::Release),
            (0u8..4).prop_map(Op::DropClaim),
        ]
    }

    proptest! {
        #[test]
        fn prop_tracker_matches_held_claims(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let tracker = InFlightTracker::new();
            let mut held: HashMap<u8, Claim> = HashMap::new();

            for op in ops {
                match op {
                    Op::Claim(n) => {
                        let claimed = tracker.try_claim(&EntryId::from(n.to_string()));
                        prop_assert_eq!(claimed.is_some(), !held.contains_key(&n));
                        if let Some(claim) = claimed {
                            held.insert(n, claim);
                        }
                    }
                    Op::Release(n) => {
                        tracker.release(&EntryId::from(n.to_string()));
                        // Dropping the now-stale guard must not disturb the tracker
                        if let Some(claim) = held.remove(&n) {
                            drop(claim);
                        }
                    }
                    Op::DropClaim(n) => {
                        held.remove(&n);
                    }
                }

                prop_assert_eq!(tracker.len(), held.len());
                for n in held.keys() {
                    prop_assert!(tracker.contains(&EntryId::from(n.to_string())));
                }
            }
        }
    }
}
