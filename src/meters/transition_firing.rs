//! Inter-firing intervals for a subscribed set of transitions.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::meters::Quota;
use crate::net::trans::TransId;
use crate::observer::{Plugin, TransObserverHandle, TransitionObserver};

/// Columns of the `transition_firings` stream: one row per firing of a
/// transition that matched the subscription's filter.
#[derive(Debug, Default)]
pub struct TransitionFiringColumns {
    /// Ordinal of the transition that fired.
    pub transition: Vec<u32>,
    /// Virtual time of the firing.
    pub firing_time: Vec<f64>,
    /// Virtual time elapsed since this transition's previous firing.
    pub interval: Vec<f64>,
}

impl TransitionFiringColumns {
    fn push(&mut self, transition: u32, firing_time: f64, interval: f64) {
        self.transition.push(transition);
        self.firing_time.push(firing_time);
        self.interval.push(interval);
    }
}

struct Collector {
    columns: TransitionFiringColumns,
    quota: Quota,
    filter: Option<HashSet<u32>>,
}

/// Handle to a `transition_firings` subscription.
#[derive(Clone)]
pub struct TransitionFiringHandle(Rc<RefCell<Collector>>);

impl TransitionFiringHandle {
    pub(crate) fn new(required: usize, filter: Option<HashSet<u32>>) -> Self {
        Self(Rc::new(RefCell::new(Collector {
            columns: TransitionFiringColumns::default(),
            quota: Quota::new(required),
            filter,
        })))
    }

    /// `true` while the column set is still short of the required row count.
    #[must_use]
    pub fn needs_more_observations(&self) -> bool {
        self.0.borrow().quota.needs_more()
    }

    /// Zero-copy read access to the accumulated columns.
    #[must_use]
    pub fn observations(&self) -> Ref<'_, TransitionFiringColumns> {
        Ref::map(self.0.borrow(), |c| &c.columns)
    }

    /// Clears all columns and progress toward the quota.
    pub fn reset(&self) {
        let mut c = self.0.borrow_mut();
        c.columns = TransitionFiringColumns::default();
        c.quota.reset();
    }

    pub(crate) fn as_plugin(&self) -> TransitionFiringPlugin {
        TransitionFiringPlugin(self.0.clone())
    }
}

/// Attaches a [`TransitionFiringObserver`] to every transition registered
/// after subscription.
pub struct TransitionFiringPlugin(Rc<RefCell<Collector>>);

impl Plugin for TransitionFiringPlugin {
    fn observe_transition(&self, _transition: &str) -> Option<TransObserverHandle> {
        Some(Box::new(TransitionFiringObserver {
            shared: self.0.clone(),
            ordinal: 0,
            previous_firing_time: 0.0,
        }))
    }
}

struct TransitionFiringObserver {
    shared: Rc<RefCell<Collector>>,
    ordinal: u32,
    /// Initialized to the simulation's start time (always 0.0: observers are
    /// attached before `start()` ever runs), per the collector's contract
    /// that the very first firing still has a well-defined interval to
    /// report against.
    previous_firing_time: f64,
}

impl TransitionObserver for TransitionFiringObserver {
    fn bind_transition(&mut self, transition: TransId) {
        self.ordinal = transition.index() as u32;
    }

    fn after_firing(&mut self, time: f64) {
        let mut collector = self.shared.borrow_mut();
        if collector.quota.is_full() {
            drop(collector);
            self.previous_firing_time = time;
            return;
        }
        if let Some(filter) = &collector.filter {
            if !filter.contains(&self.ordinal) {
                drop(collector);
                self.previous_firing_time = time;
                return;
            }
        }
        collector
            .columns
            .push(self.ordinal, time, time - self.previous_firing_time);
        collector.quota.record();
        drop(collector);
        self.previous_firing_time = time;
    }
}
