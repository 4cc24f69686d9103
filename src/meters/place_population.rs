//! Piecewise-constant place occupancy over time.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::meters::Quota;
use crate::net::place::PlaceId;
use crate::net::token::Token;
use crate::observer::{PlaceObserver, PlaceObserverHandle, Plugin};

/// Columns of the `place_population` stream: one row per interval during
/// which a place held a constant token count.
#[derive(Debug, Default)]
pub struct PlacePopulationColumns {
    /// Ordinal of the place this row describes.
    pub place: Vec<u32>,
    /// Virtual time the interval began.
    pub start_time: Vec<f64>,
    /// Token count held throughout the interval.
    pub count: Vec<u64>,
    /// Length of the interval, in virtual time.
    pub duration: Vec<f64>,
}

impl PlacePopulationColumns {
    fn push(&mut self, place: u32, start_time: f64, count: u64, duration: f64) {
        self.place.push(place);
        self.start_time.push(start_time);
        self.count.push(count);
        self.duration.push(duration);
    }
}

struct Collector {
    columns: PlacePopulationColumns,
    quota: Quota,
}

/// Handle to a `place_population` subscription.
#[derive(Clone)]
pub struct PlacePopulationHandle(Rc<RefCell<Collector>>);

impl PlacePopulationHandle {
    pub(crate) fn new(required: usize) -> Self {
        Self(Rc::new(RefCell::new(Collector {
            columns: PlacePopulationColumns::default(),
            quota: Quota::new(required),
        })))
    }

    /// `true` while the column set is still short of the required row count.
    #[must_use]
    pub fn needs_more_observations(&self) -> bool {
        self.0.borrow().quota.needs_more()
    }

    /// Zero-copy read access to the accumulated columns.
    #[must_use]
    pub fn observations(&self) -> Ref<'_, PlacePopulationColumns> {
        Ref::map(self.0.borrow(), |c| &c.columns)
    }

    /// Clears all columns and progress toward the quota.
    pub fn reset(&self) {
        let mut c = self.0.borrow_mut();
        c.columns = PlacePopulationColumns::default();
        c.quota.reset();
    }

    pub(crate) fn as_plugin(&self) -> PlacePopulationPlugin {
        PlacePopulationPlugin(self.0.clone())
    }
}

/// Attaches a [`PlacePopulationObserver`] to every place constructed after
/// subscription.
pub struct PlacePopulationPlugin(Rc<RefCell<Collector>>);

impl Plugin for PlacePopulationPlugin {
    fn observe_place(&self, _place: &str) -> Option<PlaceObserverHandle> {
        Some(Box::new(PlacePopulationObserver {
            shared: self.0.clone(),
            ordinal: 0,
            count: 0,
            time_of_last_move: 0.0,
        }))
    }
}

/// Bound to a concrete place via [`PlaceObserver::bind_place`] right after
/// the plugin factory returns it, since the place's own ordinal is not
/// known to the factory at `observe_place` time.
struct PlacePopulationObserver {
    shared: Rc<RefCell<Collector>>,
    ordinal: u32,
    count: u64,
    time_of_last_move: f64,
}

impl PlacePopulationObserver {
    fn emit_interval(&mut self, now: f64) {
        let duration = now - self.time_of_last_move;
        if duration <= 0.0 {
            return;
        }
        let mut collector = self.shared.borrow_mut();
        if collector.quota.is_full() {
            return;
        }
        collector
            .columns
            .push(self.ordinal, self.time_of_last_move, self.count, duration);
        collector.quota.record();
    }
}

impl PlaceObserver for PlacePopulationObserver {
    fn bind_place(&mut self, place: PlaceId) {
        self.ordinal = place.index() as u32;
    }

    fn report_arrival_of(&mut self, time: f64, _token: &Token) {
        self.emit_interval(time);
        self.count += 1;
        self.time_of_last_move = time;
    }

    fn report_departure_of(&mut self, time: f64, _token: &Token) {
        self.emit_interval(time);
        self.count -= 1;
        self.time_of_last_move = time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::token::TokenTypeId;

    #[test]
    fn arrivals_and_departures_emit_piecewise_intervals() {
        let handle = PlacePopulationHandle::new(10);
        let plugin = handle.as_plugin();
        let mut obs = plugin.observe_place("buffer").unwrap();
        obs.bind_place(PlaceId(3));
        let tok = Token::new(1, TokenTypeId(0));

        obs.report_arrival_of(0.0, &tok);
        obs.report_arrival_of(2.0, &tok);
        obs.report_departure_of(5.0, &tok);

        let cols = handle.observations();
        assert_eq!(cols.place, vec![3, 3]);
        assert_eq!(cols.start_time, vec![0.0, 2.0]);
        assert_eq!(cols.count, vec![0, 1]);
        assert_eq!(cols.duration, vec![2.0, 3.0]);
    }

    #[test]
    fn quota_halts_further_rows() {
        let handle = PlacePopulationHandle::new(1);
        let plugin = handle.as_plugin();
        let mut obs = plugin.observe_place("buffer").unwrap();
        let tok = Token::new(1, TokenTypeId(0));
        obs.report_arrival_of(1.0, &tok);
        obs.report_arrival_of(2.0, &tok);
        assert_eq!(handle.observations().place.len(), 1);
    }
}
