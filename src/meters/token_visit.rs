//! Per-visit sojourn times: how long each token dwelt at each place.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::meters::Quota;
use crate::net::place::PlaceId;
use crate::observer::{Plugin, TokenObserver, TokenObserverHandle};

/// Columns of the `token_visits` stream: one row per token-at-place
/// sojourn that matched the subscription's place filter.
#[derive(Debug, Default)]
pub struct TokenVisitColumns {
    /// Identity of the visiting token.
    pub token_id: Vec<u64>,
    /// Ordinal of the token's type.
    pub token_type: Vec<u32>,
    /// Virtual time the token arrived at `place`.
    pub start_time: Vec<f64>,
    /// How many places this token had visited by the time it arrived here,
    /// counting this visit.
    pub visit_number: Vec<u64>,
    /// Ordinal of the place the token sojourned at.
    pub place: Vec<u32>,
    /// How long the token dwelt at `place` before departing.
    pub duration: Vec<f64>,
}

impl TokenVisitColumns {
    fn push(
        &mut self,
        token_id: u64,
        token_type: u32,
        start_time: f64,
        visit_number: u64,
        place: u32,
        duration: f64,
    ) {
        self.token_id.push(token_id);
        self.token_type.push(token_type);
        self.start_time.push(start_time);
        self.visit_number.push(visit_number);
        self.place.push(place);
        self.duration.push(duration);
    }
}

struct Collector {
    columns: TokenVisitColumns,
    quota: Quota,
    filter: Option<HashSet<u32>>,
}

/// Handle to a `token_visits` subscription.
#[derive(Clone)]
pub struct TokenVisitHandle(Rc<RefCell<Collector>>);

impl TokenVisitHandle {
    pub(crate) fn new(required: usize, filter: Option<HashSet<u32>>) -> Self {
        Self(Rc::new(RefCell::new(Collector {
            columns: TokenVisitColumns::default(),
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
    pub fn observations(&self) -> Ref<'_, TokenVisitColumns> {
        Ref::map(self.0.borrow(), |c| &c.columns)
    }

    /// Clears all columns and progress toward the quota.
    pub fn reset(&self) {
        let mut c = self.0.borrow_mut();
        c.columns = TokenVisitColumns::default();
        c.quota.reset();
    }

    pub(crate) fn as_plugin(&self) -> TokenVisitPlugin {
        TokenVisitPlugin(self.0.clone())
    }
}

/// Attaches a [`TokenVisitObserver`] to every token constructed after
/// subscription.
pub struct TokenVisitPlugin(Rc<RefCell<Collector>>);

impl Plugin for TokenVisitPlugin {
    fn observe_token(
        &self,
        token_id: u64,
        token_type_id: u32,
        _token_type: &str,
    ) -> Option<TokenObserverHandle> {
        Some(Box::new(TokenVisitObserver {
            shared: self.0.clone(),
            token_id,
            token_type: token_type_id,
            arrival_time: 0.0,
            visit_number: 0,
        }))
    }
}

struct TokenVisitObserver {
    shared: Rc<RefCell<Collector>>,
    token_id: u64,
    token_type: u32,
    arrival_time: f64,
    visit_number: u64,
}

impl TokenObserver for TokenVisitObserver {
    fn report_arrival_at(&mut self, time: f64, _place: PlaceId) {
        self.arrival_time = time;
        self.visit_number += 1;
    }

    fn report_departure_from(&mut self, time: f64, place: PlaceId) {
        let mut collector = self.shared.borrow_mut();
        if collector.quota.is_full() {
            return;
        }
        let ordinal = place.index() as u32;
        if let Some(filter) = &collector.filter {
            if !filter.contains(&ordinal) {
                return;
            }
        }
        let duration = time - self.arrival_time;
        collector.columns.push(
            self.token_id,
            self.token_type,
            self.arrival_time,
            self.visit_number,
            ordinal,
            duration,
        );
        collector.quota.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_handle_starts_needing_observations() {
        let handle = TokenVisitHandle::new(2, None);
        assert!(handle.needs_more_observations());
    }

    #[test]
    fn filtered_observer_skips_places_outside_the_set() {
        let mut filter = HashSet::new();
        filter.insert(1u32);
        let handle = TokenVisitHandle::new(5, Some(filter));
        let plugin = handle.as_plugin();
        let mut obs = plugin.observe_token(7, 0, "job").unwrap();
        obs.report_arrival_at(0.0, PlaceId(0));
        obs.report_departure_from(1.0, PlaceId(0));
        assert!(handle.observations().token_id.is_empty());

        obs.report_arrival_at(1.0, PlaceId(1));
        obs.report_departure_from(2.5, PlaceId(1));
        let cols = handle.observations();
        assert_eq!(cols.token_id, vec![7]);
        assert_eq!(cols.place, vec![1]);
        assert_eq!(cols.visit_number, vec![2]);
        assert!((cols.duration[0] - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_rows_and_progress() {
        let handle = TokenVisitHandle::new(1, None);
        let plugin = handle.as_plugin();
        let mut obs = plugin.observe_token(1, 0, "job").unwrap();
        obs.report_arrival_at(0.0, PlaceId(0));
        obs.report_departure_from(1.5, PlaceId(0));
        assert!(!handle.needs_more_observations());
        handle.reset();
        assert!(handle.needs_more_observations());
        assert!(handle.observations().token_id.is_empty());
    }

    #[test]
    fn saturated_quota_stops_recording() {
        let handle = TokenVisitHandle::new(1, None);
        let plugin = handle.as_plugin();
        let mut obs = plugin.observe_token(1, 0, "job").unwrap();
        obs.report_arrival_at(0.0, PlaceId(0));
        obs.report_departure_from(1.0, PlaceId(0));
        obs.report_arrival_at(1.0, PlaceId(0));
        obs.report_departure_from(2.0, PlaceId(0));
        assert_eq!(handle.observations().token_id.len(), 1);
    }
}
