//! Fire control: the discrete-event scheduler.
//!
//! Picks the next transition per the stochastic-Petri-net firing rule
//! and advances virtual time. Owns no net structure —
//! it only ever sees `TransId`s, priorities, weights and deadlines,
//! handed to it by [`crate::net::Net`], which is the only thing with
//! access to the arc/place/token arenas.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::RngCore;

use crate::error::SimError;
use crate::net::trans::TransId;

/// One entry on the timed-transition deadline heap.
///
/// Ordered to make `BinaryHeap` (a max-heap) behave as the required
/// min-heap over `(deadline, tiebreak)`: earliest deadline first, ties
/// broken by insertion order. The reversed-comparison wrapper is the
/// same trick `timely`'s frontier notificator uses to turn a max-heap
/// into a min-heap without a newtype per element.
struct TimedEntry {
    deadline: f64,
    tiebreak: u64,
    trans: TransId,
}

impl PartialEq for TimedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.tiebreak == other.tiebreak
    }
}
impl Eq for TimedEntry {}

impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .partial_cmp(&self.deadline)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.tiebreak.cmp(&self.tiebreak))
    }
}

/// The discrete-event scheduler.
pub struct FireControl<R: RngCore> {
    current_time: f64,
    /// `priority -> (trans, weight)` buckets. Never removed once created,
    /// even when emptied — matching the lazy-heap-cleanup design note.
    priority_levels: HashMap<i32, Vec<(TransId, f64)>>,
    active_priority_heap: BinaryHeap<i32>,
    active_priority_set: HashSet<i32>,
    timed_heap: BinaryHeap<TimedEntry>,
    next_tiebreak: u64,
    rng: R,
}

impl<R: RngCore> FireControl<R> {
    /// Creates an idle scheduler seeded with the given RNG.
    pub fn new(rng: R) -> Self {
        Self {
            current_time: 0.0,
            priority_levels: HashMap::new(),
            active_priority_heap: BinaryHeap::new(),
            active_priority_set: HashSet::new(),
            timed_heap: BinaryHeap::new(),
            next_tiebreak: 0,
            rng,
        }
    }

    /// The current virtual time.
    #[inline]
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Clears all scheduler state and resets the virtual clock, without
    /// discarding the RNG (a fresh `reset(); start();` cycle should not
    /// replay identical RNG draws unless the caller also reseeds).
    pub(crate) fn reset(&mut self) {
        self.current_time = 0.0;
        self.priority_levels.clear();
        self.active_priority_heap.clear();
        self.active_priority_set.clear();
        self.timed_heap.clear();
        self.next_tiebreak = 0;
    }

    /// Registers `trans` as a ready immediate transition at `priority`
    /// with the given `weight`.
    pub(crate) fn enable_immediate(&mut self, trans: TransId, priority: i32, weight: f64) {
        let bucket = self.priority_levels.entry(priority).or_default();
        bucket.push((trans, weight));
        if self.active_priority_set.insert(priority) {
            self.active_priority_heap.push(priority);
        }
    }

    /// Removes `trans` from its priority bucket.
    pub(crate) fn disable_immediate(&mut self, trans: TransId, priority: i32) {
        if let Some(bucket) = self.priority_levels.get_mut(&priority) {
            if let Some(pos) = bucket.iter().position(|&(t, _)| t == trans) {
                bucket.swap_remove(pos);
            }
        }
    }

    /// Samples a fresh deadline for `trans` and schedules it.
    pub(crate) fn enable_timed(&mut self, trans: TransId, duration: f64) {
        let tiebreak = self.next_tiebreak;
        self.next_tiebreak += 1;
        self.timed_heap.push(TimedEntry {
            deadline: self.current_time + duration,
            tiebreak,
            trans,
        });
    }

    /// Removes the entry at the top of the timed heap, asserting it
    /// belongs to `trans` — the only legal caller is `Net::fire_next`,
    /// right after firing `trans` itself, per the Stable-place-status
    /// guarantee that no other event can invalidate a timed transition's
    /// enablement.
    pub(crate) fn remove_stale_timed(&mut self, trans: TransId) {
        debug_assert!(self
            .timed_heap
            .peek()
            .map(|e| e.trans == trans)
            .unwrap_or(false));
        self.timed_heap.pop();
    }

    /// Picks the next transition to fire and the virtual time it fires
    /// at, without mutating any state beyond lazily dropping empty
    /// priority-bucket entries from the active heap.
    pub(crate) fn select_next(&mut self) -> Result<(f64, TransId), SimError> {
        loop {
            if let Some(&priority) = self.active_priority_heap.peek() {
                let bucket = self
                    .priority_levels
                    .get(&priority)
                    .expect("active priority always has a bucket");
                if bucket.is_empty() {
                    self.active_priority_heap.pop();
                    self.active_priority_set.remove(&priority);
                    continue;
                }
                let weights: Vec<f64> = bucket.iter().map(|&(_, w)| w).collect();
                let dist = WeightedIndex::new(&weights).expect("positive transition weights");
                let idx = dist.sample(&mut self.rng);
                return Ok((self.current_time, bucket[idx].0));
            }
            if let Some(entry) = self.timed_heap.peek() {
                return Ok((entry.deadline, entry.trans));
            }
            return Err(SimError::NoEnabledTransition);
        }
    }

    /// Advances the virtual clock. Only ever moves forward.
    pub(crate) fn advance_time_to(&mut self, time: f64) {
        debug_assert!(time >= self.current_time);
        self.current_time = time;
    }

    /// Whether `trans` already has a deadline entry on the timed heap.
    ///
    /// Used right after a timed transition fires: if it re-enabled itself
    /// mid-firing (a self-refilling loop), the crossing-detection path
    /// already pushed a fresh entry, and `Net::fire_next` must not push a
    /// second one.
    pub(crate) fn has_pending(&self, trans: TransId) -> bool {
        self.timed_heap.iter().any(|e| e.trans == trans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sched() -> FireControl<ChaCha8Rng> {
        FireControl::new(ChaCha8Rng::seed_from_u64(42))
    }

    #[test]
    fn no_transitions_means_no_enabled_transition() {
        let mut s = sched();
        assert!(matches!(
            s.select_next(),
            Err(SimError::NoEnabledTransition)
        ));
    }

    #[test]
    fn immediate_always_preempts_timed() {
        let mut s = sched();
        s.enable_timed(TransId(0), 1.0);
        s.enable_immediate(TransId(1), 1, 1.0);
        let (time, t) = s.select_next().unwrap();
        assert_eq!(time, 0.0);
        assert_eq!(t, TransId(1));
    }

    #[test]
    fn higher_priority_bucket_wins_regardless_of_weight() {
        let mut s = sched();
        s.enable_immediate(TransId(0), 1, 1000.0);
        s.enable_immediate(TransId(1), 2, 0.001);
        let (_, t) = s.select_next().unwrap();
        assert_eq!(t, TransId(1));
    }

    #[test]
    fn lazy_cleanup_skips_emptied_bucket() {
        let mut s = sched();
        s.enable_immediate(TransId(0), 2, 1.0);
        s.enable_immediate(TransId(1), 1, 1.0);
        s.disable_immediate(TransId(0), 2);
        let (_, t) = s.select_next().unwrap();
        assert_eq!(t, TransId(1));
    }

    #[test]
    fn timed_heap_orders_by_deadline_then_insertion() {
        let mut s = sched();
        s.enable_timed(TransId(0), 2.0);
        s.enable_timed(TransId(1), 1.0);
        s.enable_timed(TransId(2), 1.0);
        let (d0, t0) = s.select_next().unwrap();
        assert_eq!(d0, 1.0);
        assert_eq!(t0, TransId(1));
        s.remove_stale_timed(t0);
        let (d1, t1) = s.select_next().unwrap();
        assert_eq!(d1, 1.0);
        assert_eq!(t1, TransId(2));
    }

    #[test]
    fn has_pending_reflects_timed_heap_membership() {
        let mut s = sched();
        assert!(!s.has_pending(TransId(0)));
        s.enable_timed(TransId(0), 1.0);
        assert!(s.has_pending(TransId(0)));
        assert!(!s.has_pending(TransId(1)));
    }

    #[test]
    fn weighted_choice_converges_to_weights() {
        let mut s = sched();
        let mut counts = [0u32; 2];
        for _ in 0..40_000 {
            s.enable_immediate(TransId(0), 1, 1.0);
            s.enable_immediate(TransId(1), 1, 3.0);
            let (_, t) = s.select_next().unwrap();
            counts[t.index()] += 1;
            s.disable_immediate(TransId(0), 1);
            s.disable_immediate(TransId(1), 1);
        }
        let total = f64::from(counts[0] + counts[1]);
        let frac0 = f64::from(counts[0]) / total;
        assert!((frac0 - 0.25).abs() < 0.02, "got {frac0}");
    }
}
